//! Reconcile error types.

use thiserror::Error;

use crate::clients::ApiError;
use crate::credentials::CredentialError;
use crate::resource::IdentityError;
use crate::store::StoreError;

/// Errors returned by the connector and external client operations.
///
/// None of these are retried locally; the engine decides when to run the
/// next pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The engine handed over a record of another kind.
    #[error("managed resource is not a Droplet resource (got {actual})")]
    WrongKind { actual: String },

    #[error("cannot get provider credentials: {0}")]
    Credential(#[from] CredentialError),

    #[error("cannot get droplet: {0}")]
    Observe(#[source] ApiError),

    #[error("creation of Droplet resource has failed: {0}")]
    Create(#[source] ApiError),

    #[error("deletion of Droplet resource has failed: {0}")]
    Delete(#[source] ApiError),

    /// Reading the record from the store failed.
    #[error("cannot get managed Droplet resource: {0}")]
    Load(#[source] StoreError),

    /// Persisting the record failed.
    #[error("cannot update managed Droplet resource: {0}")]
    Update(#[source] StoreError),

    #[error("invalid external name transition: {0}")]
    Identity(#[from] IdentityError),
}

/// Result type for reconcile operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
