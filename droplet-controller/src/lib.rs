//! Droplet controller.
//!
//! Keeps a declarative Droplet record in sync with one DigitalOcean droplet:
//! - [`reconciler`]: connector and external client (Observe, Create, Update, Delete)
//! - [`clients`]: provider API boundary and its HTTP implementation
//! - [`credentials`]: API token resolution
//! - [`store`]: record persistence
//! - [`pass`]: one reconciliation pass over a stored record

pub mod clients;
pub mod credentials;
pub mod error;
pub mod pass;
pub mod reconciler;
pub mod resource;
pub mod store;

pub use error::{ReconcileError, Result};
pub use pass::{reconcile_once, PassOutcome};
pub use reconciler::{
    DropletConnector, DropletExternal, DropletPatch, ExternalClient, ExternalConnecter,
    ExternalCreation, ExternalObservation, ExternalUpdate,
};
pub use resource::{Droplet, DropletParameters, Identity, Managed};
