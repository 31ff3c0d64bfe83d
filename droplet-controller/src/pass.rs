//! Single reconciliation pass for one Droplet record.
//!
//! This is the thin engine side of the controller: load the record, connect,
//! observe, then create or delete as needed, record the `Synced` condition and
//! write the record back.

use std::fmt;

use tracing::{error, info};

use crate::error::{ReconcileError, Result};
use crate::reconciler::{DropletPatch, ExternalConnecter};
use crate::resource::{Condition, DeletionPolicy, Droplet, Managed};
use crate::store::RecordStore;

/// What a pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The droplet exists and matches the record.
    UpToDate,
    /// A droplet was created.
    Created,
    /// The droplet was updated.
    Updated,
    /// The droplet was deleted, or is already gone.
    Deleted,
    /// Deletion was requested with the Orphan policy; the droplet was left alone.
    Orphaned,
}

impl fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PassOutcome::UpToDate => "up to date",
            PassOutcome::Created => "created",
            PassOutcome::Updated => "updated",
            PassOutcome::Deleted => "deleted",
            PassOutcome::Orphaned => "orphaned",
        };
        f.write_str(s)
    }
}

fn apply(record: &mut Droplet, patch: &DropletPatch) -> Result<()> {
    patch.apply(record)?;
    Ok(())
}

/// Set the Ready condition and persist it before a provider call, so a
/// failed or interrupted call still leaves the in-progress state behind.
async fn mark(store: &dyn RecordStore, record: &mut Droplet, ready: Condition) -> Result<()> {
    record.status.conditions.set([ready]);
    store.update(record).await.map_err(ReconcileError::Update)
}

async fn run(
    connector: &dyn ExternalConnecter,
    store: &dyn RecordStore,
    record: &mut Droplet,
) -> Result<PassOutcome> {
    let external = connector.connect(&Managed::Droplet(record.clone())).await?;

    let observation = external.observe(&Managed::Droplet(record.clone())).await?;
    apply(record, &observation.patch)?;

    if record.metadata.deletion_requested {
        if record.spec.deletion_policy == DeletionPolicy::Orphan {
            info!("Orphaning droplet of {}", record.name());
            return Ok(PassOutcome::Orphaned);
        }
        if observation.resource_exists {
            mark(store, record, Condition::deleting()).await?;
            let patch = external.delete(&Managed::Droplet(record.clone())).await?;
            apply(record, &patch)?;
        }
        return Ok(PassOutcome::Deleted);
    }

    if !observation.resource_exists {
        mark(store, record, Condition::creating()).await?;
        let creation = external.create(&Managed::Droplet(record.clone())).await?;
        apply(record, &creation.patch)?;
        if creation.external_name_assigned {
            // Persist right away; losing the ID would leak the droplet
            store.update(record).await.map_err(ReconcileError::Update)?;
        }
        return Ok(PassOutcome::Created);
    }

    if !observation.resource_up_to_date {
        let update = external.update(&Managed::Droplet(record.clone())).await?;
        apply(record, &update.patch)?;
        return Ok(PassOutcome::Updated);
    }

    Ok(PassOutcome::UpToDate)
}

/// Run one pass for the record called `name`.
///
/// The outcome of the pass is recorded as the `Synced` condition, and the
/// record is persisted whether or not the pass succeeded.
pub async fn reconcile_once(
    connector: &dyn ExternalConnecter,
    store: &dyn RecordStore,
    name: &str,
) -> Result<PassOutcome> {
    let mut record = store.get(name).await.map_err(ReconcileError::Load)?;

    let result = run(connector, store, &mut record).await;
    match &result {
        Ok(outcome) => {
            info!("Reconciled Droplet {}: {}", name, outcome);
            record.status.conditions.set([Condition::reconcile_success()]);
        }
        Err(e) => {
            error!("Reconciling Droplet {} failed: {}", name, e);
            record
                .status
                .conditions
                .set([Condition::reconcile_error(e.to_string())]);
        }
    }

    store
        .update(&record)
        .await
        .map_err(ReconcileError::Update)?;
    result
}
