//! Clients for the cloud provider.
//!
//! The controller only needs three calls against the provider: create a
//! droplet, fetch one by ID, and delete one by ID. [`DropletApi`] is that
//! boundary; [`DoClient`] implements it over the DigitalOcean HTTP API.

pub mod droplets;

pub use droplets::{
    ignore_not_found, ApiError, ClientFactory, DoClient, DoClientFactory, DropletApi,
    DropletCreateRequest, ObservedDroplet,
};
