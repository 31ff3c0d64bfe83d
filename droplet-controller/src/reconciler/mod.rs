//! External client contract for Droplet records.
//!
//! The engine connects once per pass, then calls Observe and, depending on
//! the observation, Create, Update or Delete. Operations take a snapshot of
//! the record and return a [`DropletPatch`] the engine applies afterwards.

pub mod droplet;
pub mod parameters;

use async_trait::async_trait;

use crate::error::Result;
use crate::resource::{
    Condition, Droplet, DropletObservation, DropletParameters, Identity, IdentityError, Managed,
};

pub use droplet::{DropletConnector, DropletExternal};

/// Field updates produced by one operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DropletPatch {
    pub external_name: Option<Identity>,
    pub for_provider: Option<DropletParameters>,
    pub at_provider: Option<DropletObservation>,
    pub conditions: Vec<Condition>,
}

impl DropletPatch {
    /// Patch that only sets conditions.
    pub fn with_conditions(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self {
            conditions: conditions.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.external_name.is_none()
            && self.for_provider.is_none()
            && self.at_provider.is_none()
            && self.conditions.is_empty()
    }

    /// Apply the patch to a record.
    ///
    /// A patch may not move an assigned external name anywhere else; such a
    /// patch is rejected before anything is written.
    pub fn apply(&self, record: &mut Droplet) -> std::result::Result<(), IdentityError> {
        if let Some(next) = &self.external_name {
            if let Identity::Assigned(current) = record.metadata.external_name {
                if *next != Identity::Assigned(current) {
                    return Err(IdentityError::AlreadyAssigned { current });
                }
            }
            record.metadata.external_name = next.clone();
        }
        if let Some(params) = &self.for_provider {
            record.spec.for_provider = params.clone();
        }
        if let Some(obs) = &self.at_provider {
            record.status.at_provider = obs.clone();
        }
        record.status.conditions.set(self.conditions.iter().cloned());
        Ok(())
    }
}

/// Result of observing the external resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
    pub patch: DropletPatch,
}

impl ExternalObservation {
    /// Nothing exists at the provider.
    pub fn absent() -> Self {
        Self::default()
    }
}

/// Result of creating the external resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalCreation {
    /// The external name changed and must be persisted.
    pub external_name_assigned: bool,
    pub patch: DropletPatch,
}

/// Result of updating the external resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalUpdate {
    pub patch: DropletPatch,
}

/// Lifecycle operations against one external resource.
#[async_trait]
pub trait ExternalClient: Send + Sync {
    async fn observe(&self, mg: &Managed) -> Result<ExternalObservation>;

    async fn create(&self, mg: &Managed) -> Result<ExternalCreation>;

    async fn update(&self, mg: &Managed) -> Result<ExternalUpdate>;

    async fn delete(&self, mg: &Managed) -> Result<DropletPatch>;
}

/// Produces an [`ExternalClient`] for one pass.
#[async_trait]
pub trait ExternalConnecter: Send + Sync {
    async fn connect(&self, mg: &Managed) -> Result<Box<dyn ExternalClient>>;
}
