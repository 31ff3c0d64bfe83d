//! Droplet external client - reconciles Droplet records with the provider.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::parameters::{create_request, late_initialize};
use super::{
    DropletPatch, ExternalClient, ExternalConnecter, ExternalCreation, ExternalObservation,
    ExternalUpdate,
};
use crate::clients::{ignore_not_found, ClientFactory, DropletApi};
use crate::credentials::CredentialSource;
use crate::error::{ReconcileError, Result};
use crate::resource::{
    Condition, Droplet, DropletObservation, DropletState, Identity, IdentityError, Managed,
};
use crate::store::RecordStore;

fn droplet(mg: &Managed) -> Result<&Droplet> {
    mg.as_droplet().ok_or_else(|| ReconcileError::WrongKind {
        actual: mg.kind().to_string(),
    })
}

/// Resolves credentials and binds a provider client for one pass.
pub struct DropletConnector {
    credentials: Arc<dyn CredentialSource>,
    clients: Arc<dyn ClientFactory>,
    store: Arc<dyn RecordStore>,
}

impl DropletConnector {
    pub fn new(
        credentials: Arc<dyn CredentialSource>,
        clients: Arc<dyn ClientFactory>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            credentials,
            clients,
            store,
        }
    }
}

#[async_trait]
impl ExternalConnecter for DropletConnector {
    async fn connect(&self, mg: &Managed) -> Result<Box<dyn ExternalClient>> {
        let cr = droplet(mg)?;
        let token = self
            .credentials
            .resolve(&cr.spec.provider_config_ref)
            .await?;
        debug!(
            "Connected Droplet {} using provider config {}",
            cr.name(),
            cr.spec.provider_config_ref.name
        );
        Ok(Box::new(DropletExternal::new(
            self.clients.client(&token),
            Arc::clone(&self.store),
        )))
    }
}

/// External client bound to one provider token.
pub struct DropletExternal {
    api: Box<dyn DropletApi>,
    store: Arc<dyn RecordStore>,
}

impl DropletExternal {
    pub fn new(api: Box<dyn DropletApi>, store: Arc<dyn RecordStore>) -> Self {
        Self { api, store }
    }
}

#[async_trait]
impl ExternalClient for DropletExternal {
    async fn observe(&self, mg: &Managed) -> Result<ExternalObservation> {
        let cr = droplet(mg)?;

        let id = match cr.external_name() {
            Identity::Unassigned => return Ok(ExternalObservation::absent()),
            // A name the user picked is not a provider ID; nothing can be found under it
            Identity::PendingNumeric(name) => {
                debug!("Droplet {} has no provider ID yet ({})", cr.name(), name);
                return Ok(ExternalObservation::absent());
            }
            Identity::Assigned(id) => *id,
        };

        let observed = match ignore_not_found(self.api.get(id).await)
            .map_err(ReconcileError::Observe)?
        {
            Some(observed) => observed,
            None => {
                info!("Droplet {} ({}) not found at provider", cr.name(), id);
                return Ok(ExternalObservation::absent());
            }
        };

        let mut patch = DropletPatch::default();

        let mut params = cr.spec.for_provider.clone();
        late_initialize(&mut params, &observed);
        if params != cr.spec.for_provider {
            let mut updated = cr.clone();
            updated.spec.for_provider = params.clone();
            self.store
                .update(&updated)
                .await
                .map_err(ReconcileError::Update)?;
            info!("Late-initialized parameters of Droplet {}", cr.name());
            patch.for_provider = Some(params);
        }

        match observed.status {
            DropletState::New => patch.conditions.push(Condition::creating()),
            DropletState::Active => patch.conditions.push(Condition::available()),
            _ => {}
        }

        patch.at_provider = Some(DropletObservation {
            id: observed.id,
            creation_timestamp: observed.created,
            status: observed.status,
        });

        // Droplets cannot be updated, so an existing one is always up to date
        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: true,
            patch,
        })
    }

    async fn create(&self, mg: &Managed) -> Result<ExternalCreation> {
        let cr = droplet(mg)?;
        let identity = cr.external_name();

        let name = match identity {
            Identity::Unassigned => cr.name().to_string(),
            Identity::PendingNumeric(name) => name.clone(),
            // Refuse before creating a second droplet for the same record
            Identity::Assigned(current) => {
                return Err(IdentityError::AlreadyAssigned { current: *current }.into());
            }
        };

        info!("Creating droplet {} for {}", name, cr.name());
        let req = create_request(&name, &cr.spec.for_provider);
        let created = self.api.create(&req).await.map_err(ReconcileError::Create)?;

        let assigned = identity.assign(created.id)?;
        info!("Droplet {} created with ID {}", cr.name(), created.id);

        Ok(ExternalCreation {
            external_name_assigned: true,
            patch: DropletPatch {
                external_name: Some(assigned),
                conditions: vec![Condition::creating()],
                ..Default::default()
            },
        })
    }

    async fn update(&self, _mg: &Managed) -> Result<ExternalUpdate> {
        // Droplets cannot be updated.
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, mg: &Managed) -> Result<DropletPatch> {
        let cr = droplet(mg)?;
        let patch = DropletPatch::with_conditions([Condition::deleting()]);

        let id = cr.status.at_provider.id;
        if id == 0 {
            info!("Droplet {} was never observed, nothing to delete", cr.name());
            return Ok(patch);
        }

        info!("Deleting droplet {} ({})", cr.name(), id);
        match ignore_not_found(self.api.delete(id).await).map_err(ReconcileError::Delete)? {
            Some(()) => info!("Droplet {} deleted", id),
            None => debug!("Droplet {} already gone", id),
        }
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::clients::{ApiError, DropletCreateRequest, ObservedDroplet};
    use crate::resource::{ConditionReason, ConditionType, DropletParameters};
    use crate::store::{MemoryStore, StoreError};

    #[derive(Default)]
    struct FakeApi {
        droplets: Mutex<HashMap<u64, ObservedDroplet>>,
        created: Mutex<Vec<DropletCreateRequest>>,
        gets: Mutex<Vec<u64>>,
        deletes: Mutex<Vec<u64>>,
        fail: Mutex<Option<u16>>,
    }

    impl FakeApi {
        fn failure(&self) -> Option<ApiError> {
            self.fail.lock().unwrap().map(|status| ApiError::Status {
                status,
                id: None,
                message: "server error".into(),
            })
        }
    }

    #[async_trait]
    impl DropletApi for Arc<FakeApi> {
        async fn create(
            &self,
            req: &DropletCreateRequest,
        ) -> std::result::Result<ObservedDroplet, ApiError> {
            if let Some(e) = self.failure() {
                return Err(e);
            }
            self.created.lock().unwrap().push(req.clone());
            let droplet = ObservedDroplet {
                id: 123456,
                name: req.name.clone(),
                status: DropletState::New,
                ..Default::default()
            };
            self.droplets.lock().unwrap().insert(droplet.id, droplet.clone());
            Ok(droplet)
        }

        async fn get(&self, id: u64) -> std::result::Result<ObservedDroplet, ApiError> {
            self.gets.lock().unwrap().push(id);
            if let Some(e) = self.failure() {
                return Err(e);
            }
            self.droplets.lock().unwrap().get(&id).cloned().ok_or(ApiError::NotFound)
        }

        async fn delete(&self, id: u64) -> std::result::Result<(), ApiError> {
            self.deletes.lock().unwrap().push(id);
            if let Some(e) = self.failure() {
                return Err(e);
            }
            self.droplets.lock().unwrap().remove(&id).map(|_| ()).ok_or(ApiError::NotFound)
        }
    }

    struct FailingStore;

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn get(&self, name: &str) -> crate::store::Result<Droplet> {
            Err(StoreError::NotFound(name.to_string()))
        }

        async fn update(&self, record: &Droplet) -> crate::store::Result<()> {
            Err(StoreError::Conflict(record.name().to_string()))
        }
    }

    fn record() -> Droplet {
        Droplet::new(
            "web",
            DropletParameters {
                region: "nyc1".into(),
                size: "s-1vcpu-1gb".into(),
                image: "ubuntu-20-04".into(),
                ..Default::default()
            },
        )
    }

    fn external(api: &Arc<FakeApi>) -> (DropletExternal, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_record(record()));
        (
            DropletExternal::new(Box::new(Arc::clone(api)), store.clone()),
            store,
        )
    }

    fn with_identity(identity: Identity) -> Managed {
        let mut cr = record();
        cr.metadata.external_name = identity;
        Managed::Droplet(cr)
    }

    fn ready_reason(patch: &DropletPatch) -> Option<ConditionReason> {
        patch
            .conditions
            .iter()
            .find(|c| c.kind == ConditionType::Ready)
            .map(|c| c.reason)
    }

    #[tokio::test]
    async fn test_wrong_kind_rejected() {
        let api = Arc::new(FakeApi::default());
        let (ext, _) = external(&api);
        let other = Managed::Other {
            kind: "Volume".into(),
            name: "data".into(),
        };

        assert!(matches!(
            ext.observe(&other).await,
            Err(ReconcileError::WrongKind { actual }) if actual == "Volume"
        ));
        assert!(matches!(ext.create(&other).await, Err(ReconcileError::WrongKind { .. })));
        assert!(matches!(ext.delete(&other).await, Err(ReconcileError::WrongKind { .. })));
    }

    #[tokio::test]
    async fn test_observe_without_identity_skips_api() {
        let api = Arc::new(FakeApi::default());
        let (ext, _) = external(&api);

        let obs = ext.observe(&with_identity(Identity::Unassigned)).await.unwrap();
        assert!(!obs.resource_exists);
        assert!(obs.patch.is_empty());

        let obs = ext
            .observe(&with_identity(Identity::PendingNumeric("my-web".into())))
            .await
            .unwrap();
        assert!(!obs.resource_exists);
        assert!(api.gets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_observe_not_found_is_absent() {
        let api = Arc::new(FakeApi::default());
        let (ext, _) = external(&api);

        let obs = ext.observe(&with_identity(Identity::Assigned(99))).await.unwrap();
        assert!(!obs.resource_exists);
        assert_eq!(*api.gets.lock().unwrap(), vec![99]);
    }

    #[tokio::test]
    async fn test_observe_api_error() {
        let api = Arc::new(FakeApi::default());
        *api.fail.lock().unwrap() = Some(500);
        let (ext, _) = external(&api);

        let err = ext
            .observe(&with_identity(Identity::Assigned(99)))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Observe(_)));
        assert!(err.to_string().starts_with("cannot get droplet"));
    }

    #[tokio::test]
    async fn test_observe_status_conditions() {
        let api = Arc::new(FakeApi::default());
        let (ext, _) = external(&api);
        let mg = with_identity(Identity::Assigned(123456));

        for (state, expected) in [
            (DropletState::New, Some(ConditionReason::Creating)),
            (DropletState::Active, Some(ConditionReason::Available)),
            (DropletState::Off, None),
            (DropletState::Archived, None),
        ] {
            api.droplets.lock().unwrap().insert(
                123456,
                ObservedDroplet {
                    id: 123456,
                    status: state.clone(),
                    ..Default::default()
                },
            );
            let obs = ext.observe(&mg).await.unwrap();
            assert!(obs.resource_exists);
            assert!(obs.resource_up_to_date);
            assert_eq!(ready_reason(&obs.patch), expected, "state {}", state);
            assert_eq!(obs.patch.at_provider.as_ref().unwrap().status, state);
        }
    }

    #[tokio::test]
    async fn test_observe_active_then_off_keeps_available() {
        let api = Arc::new(FakeApi::default());
        let (ext, _) = external(&api);
        let mut cr = record();
        cr.metadata.external_name = Identity::Assigned(123456);

        for state in [DropletState::Active, DropletState::Off] {
            api.droplets.lock().unwrap().insert(
                123456,
                ObservedDroplet {
                    id: 123456,
                    status: state,
                    ..Default::default()
                },
            );
            let obs = ext.observe(&Managed::Droplet(cr.clone())).await.unwrap();
            obs.patch.apply(&mut cr).unwrap();
        }

        let ready = cr.status.conditions.get(ConditionType::Ready).unwrap();
        assert_eq!(ready.reason, ConditionReason::Available);
        assert_eq!(cr.status.at_provider.status, DropletState::Off);
    }

    #[tokio::test]
    async fn test_observe_late_init_persists() {
        let api = Arc::new(FakeApi::default());
        api.droplets.lock().unwrap().insert(
            123456,
            ObservedDroplet {
                id: 123456,
                status: DropletState::Active,
                tags: vec!["team".into()],
                ..Default::default()
            },
        );
        let (ext, store) = external(&api);

        let obs = ext.observe(&with_identity(Identity::Assigned(123456))).await.unwrap();
        let params = obs.patch.for_provider.expect("late-init patch");
        assert_eq!(params.tags, vec!["team".to_string()]);
        assert_eq!(store.update_count(), 1);
        assert_eq!(store.get("web").await.unwrap().spec.for_provider, params);

        // Already initialized: nothing more to persist
        let mut cr = record();
        cr.metadata.external_name = Identity::Assigned(123456);
        cr.spec.for_provider = params;
        let obs = ext.observe(&Managed::Droplet(cr)).await.unwrap();
        assert!(obs.patch.for_provider.is_none());
        assert_eq!(store.update_count(), 1);
    }

    #[tokio::test]
    async fn test_observe_late_init_persist_failure() {
        let api = Arc::new(FakeApi::default());
        api.droplets.lock().unwrap().insert(
            123456,
            ObservedDroplet {
                id: 123456,
                status: DropletState::Active,
                ..Default::default()
            },
        );
        let ext = DropletExternal::new(Box::new(Arc::clone(&api)), Arc::new(FailingStore));

        let err = ext
            .observe(&with_identity(Identity::Assigned(123456)))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Update(_)));
    }

    #[tokio::test]
    async fn test_create_assigns_identity() {
        let api = Arc::new(FakeApi::default());
        let (ext, _) = external(&api);

        let created = ext.create(&with_identity(Identity::Unassigned)).await.unwrap();
        assert!(created.external_name_assigned);
        assert_eq!(created.patch.external_name, Some(Identity::Assigned(123456)));
        assert_eq!(ready_reason(&created.patch), Some(ConditionReason::Creating));

        let requests = api.created.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name, "web");
        assert_eq!(requests[0].image, "ubuntu-20-04");
    }

    #[tokio::test]
    async fn test_create_uses_pending_name() {
        let api = Arc::new(FakeApi::default());
        let (ext, _) = external(&api);

        let created = ext
            .create(&with_identity(Identity::PendingNumeric("frontend-a".into())))
            .await
            .unwrap();
        assert_eq!(created.patch.external_name, Some(Identity::Assigned(123456)));
        assert_eq!(api.created.lock().unwrap()[0].name, "frontend-a");
    }

    #[tokio::test]
    async fn test_create_refuses_assigned_identity() {
        let api = Arc::new(FakeApi::default());
        let (ext, _) = external(&api);

        let err = ext
            .create(&with_identity(Identity::Assigned(7)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Identity(IdentityError::AlreadyAssigned { current: 7 })
        ));
        assert!(api.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_failure() {
        let api = Arc::new(FakeApi::default());
        *api.fail.lock().unwrap() = Some(422);
        let (ext, _) = external(&api);

        let err = ext.create(&with_identity(Identity::Unassigned)).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Create(_)));
        assert!(err
            .to_string()
            .starts_with("creation of Droplet resource has failed"));
    }

    #[tokio::test]
    async fn test_update_is_noop() {
        let api = Arc::new(FakeApi::default());
        let (ext, store) = external(&api);

        for mg in [
            with_identity(Identity::Assigned(1)),
            Managed::Other {
                kind: "Volume".into(),
                name: "x".into(),
            },
        ] {
            let update = ext.update(&mg).await.unwrap();
            assert!(update.patch.is_empty());
        }
        assert_eq!(store.update_count(), 0);
        assert!(api.gets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let api = Arc::new(FakeApi::default());
        api.droplets
            .lock()
            .unwrap()
            .insert(123456, ObservedDroplet { id: 123456, ..Default::default() });
        let (ext, _) = external(&api);

        let mut cr = record();
        cr.metadata.external_name = Identity::Assigned(123456);
        cr.status.at_provider.id = 123456;
        let mg = Managed::Droplet(cr);

        let patch = ext.delete(&mg).await.unwrap();
        assert_eq!(ready_reason(&patch), Some(ConditionReason::Deleting));
        ext.delete(&mg).await.unwrap();
        assert_eq!(*api.deletes.lock().unwrap(), vec![123456, 123456]);
    }

    #[tokio::test]
    async fn test_delete_uses_observed_id() {
        let api = Arc::new(FakeApi::default());
        let (ext, _) = external(&api);

        let mut cr = record();
        cr.metadata.external_name = Identity::Assigned(111);
        cr.status.at_provider.id = 222;
        ext.delete(&Managed::Droplet(cr)).await.unwrap();
        assert_eq!(*api.deletes.lock().unwrap(), vec![222]);

        // Never observed: nothing to call
        let unobserved = with_identity(Identity::Assigned(333));
        ext.delete(&unobserved).await.unwrap();
        assert_eq!(api.deletes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_failure() {
        let api = Arc::new(FakeApi::default());
        *api.fail.lock().unwrap() = Some(500);
        let (ext, _) = external(&api);

        let mut cr = record();
        cr.status.at_provider.id = 5;
        let err = ext.delete(&Managed::Droplet(cr)).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Delete(_)));
    }
}
