//! Shared helpers for droplet-controller integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use droplet_controller::clients::{
    ApiError, ClientFactory, DropletApi, DropletCreateRequest, ObservedDroplet,
};
use droplet_controller::resource::DropletState;
use droplet_controller::{Droplet, DropletParameters};

/// Provider calls seen by the fake, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Get(u64),
    Delete(u64),
}

/// In-memory provider handing out sequential IDs starting at 123456.
pub struct FakeProvider {
    droplets: Mutex<HashMap<u64, ObservedDroplet>>,
    calls: Mutex<Vec<Call>>,
    tokens: Mutex<Vec<String>>,
    next_id: Mutex<u64>,
    fail: Mutex<Option<u16>>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            droplets: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
            next_id: Mutex::new(123456),
            fail: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn droplet(&self, id: u64) -> Option<ObservedDroplet> {
        self.droplets.lock().unwrap().get(&id).cloned()
    }

    /// Change the lifecycle status of a provisioned droplet.
    pub fn set_status(&self, id: u64, status: DropletState) {
        if let Some(d) = self.droplets.lock().unwrap().get_mut(&id) {
            d.status = status;
        }
    }

    /// Make create and delete fail with the given HTTP status.
    pub fn fail_with(&self, status: u16) {
        *self.fail.lock().unwrap() = Some(status);
    }

    fn injected_failure(&self) -> Result<(), ApiError> {
        match *self.fail.lock().unwrap() {
            Some(status) => Err(ApiError::Status {
                status,
                id: Some("server_error".to_string()),
                message: "Server was unable to give you a response.".to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Remove a droplet behind the controller's back.
    pub fn remove(&self, id: u64) {
        self.droplets.lock().unwrap().remove(&id);
    }
}

struct BoundClient {
    provider: Arc<FakeProvider>,
}

#[async_trait]
impl DropletApi for BoundClient {
    async fn create(&self, req: &DropletCreateRequest) -> Result<ObservedDroplet, ApiError> {
        let p = &self.provider;
        p.calls.lock().unwrap().push(Call::Create(req.name.clone()));
        p.injected_failure()?;

        let mut next = p.next_id.lock().unwrap();
        let droplet = ObservedDroplet {
            id: *next,
            name: req.name.clone(),
            status: DropletState::New,
            created: Some(Utc::now()),
            region: Some(req.region.clone()),
            size: Some(req.size.clone()),
            image: Some(req.image.clone()),
            features: vec!["monitoring".to_string()],
            volume_ids: req.volumes.clone(),
            tags: req.tags.clone(),
            vpc_uuid: Some("vpc-default-nyc1".to_string()),
        };
        *next += 1;
        p.droplets.lock().unwrap().insert(droplet.id, droplet.clone());
        Ok(droplet)
    }

    async fn get(&self, id: u64) -> Result<ObservedDroplet, ApiError> {
        self.provider.calls.lock().unwrap().push(Call::Get(id));
        self.provider.droplet(id).ok_or(ApiError::NotFound)
    }

    async fn delete(&self, id: u64) -> Result<(), ApiError> {
        self.provider.calls.lock().unwrap().push(Call::Delete(id));
        self.provider.injected_failure()?;
        self.provider
            .droplets
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }
}

/// Client factory that binds every client to the same fake provider.
pub struct FakeFactory {
    pub provider: Arc<FakeProvider>,
}

impl ClientFactory for FakeFactory {
    fn client(&self, token: &str) -> Box<dyn DropletApi> {
        self.provider.tokens.lock().unwrap().push(token.to_string());
        Box::new(BoundClient {
            provider: Arc::clone(&self.provider),
        })
    }
}

/// Record from the end-to-end scenario.
pub fn ubuntu_record(name: &str) -> Droplet {
    Droplet::new(
        name,
        DropletParameters {
            region: "nyc1".to_string(),
            size: "s-1vcpu-1gb".to_string(),
            image: "ubuntu-20-04".to_string(),
            ..Default::default()
        },
    )
}
