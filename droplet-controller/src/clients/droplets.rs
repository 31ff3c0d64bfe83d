//! DigitalOcean droplet API client.
//!
//! Wraps `reqwest::Client` with bearer authentication and the three droplet
//! endpoints the controller uses. Not-found responses are reported as
//! [`ApiError::NotFound`] so callers can decide whether absence is an error.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::resource::DropletState;

/// Base URL of the public DigitalOcean API.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.digitalocean.com";

/// Per-request timeout applied by the HTTP client.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors returned by the provider boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The droplet does not exist.
    #[error("droplet not found")]
    NotFound,

    /// The API answered with a non-success status.
    #[error("provider API returned {status}: {message}")]
    Status {
        status: u16,
        id: Option<String>,
        message: String,
    },

    /// The API answered successfully but without a droplet.
    #[error("provider API returned no droplet")]
    EmptyResponse,

    /// Transport or decoding failure.
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }
}

/// Turn a not-found outcome into `Ok(None)`, keeping every other error.
pub fn ignore_not_found<T>(result: Result<T, ApiError>) -> Result<Option<T>, ApiError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(ApiError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Droplet as provisioned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedDroplet {
    pub id: u64,
    pub name: String,
    pub status: DropletState,
    pub created: Option<DateTime<Utc>>,
    pub region: Option<String>,
    pub size: Option<String>,
    pub image: Option<String>,
    pub features: Vec<String>,
    pub volume_ids: Vec<String>,
    pub tags: Vec<String>,
    pub vpc_uuid: Option<String>,
}

impl ObservedDroplet {
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// Body of `POST /v2/droplets`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DropletCreateRequest {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<String>,
    pub backups: bool,
    pub ipv6: bool,
    pub private_networking: bool,
    pub monitoring: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_uuid: Option<String>,
}

/// Provider operations used by the controller.
#[async_trait]
pub trait DropletApi: Send + Sync {
    /// Create a droplet.
    async fn create(&self, req: &DropletCreateRequest) -> Result<ObservedDroplet, ApiError>;

    /// Get a droplet by ID. Absence is [`ApiError::NotFound`].
    async fn get(&self, id: u64) -> Result<ObservedDroplet, ApiError>;

    /// Delete a droplet by ID. Absence is [`ApiError::NotFound`].
    async fn delete(&self, id: u64) -> Result<(), ApiError>;
}

/// Builds a provider client bound to one API token.
pub trait ClientFactory: Send + Sync {
    fn client(&self, token: &str) -> Box<dyn DropletApi>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct DropletEnvelope {
    droplet: Option<DropletWire>,
}

#[derive(Debug, Deserialize)]
struct SlugRef {
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DropletWire {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    created_at: Option<DateTime<Utc>>,
    region: Option<SlugRef>,
    size_slug: Option<String>,
    image: Option<SlugRef>,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default)]
    volume_ids: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    vpc_uuid: Option<String>,
}

impl From<DropletWire> for ObservedDroplet {
    fn from(w: DropletWire) -> Self {
        ObservedDroplet {
            id: w.id,
            name: w.name,
            status: DropletState::from(w.status),
            created: w.created_at,
            region: w.region.and_then(|r| r.slug),
            size: w.size_slug,
            image: w.image.and_then(|i| i.slug),
            features: w.features,
            volume_ids: w.volume_ids,
            tags: w.tags,
            vpc_uuid: w.vpc_uuid.filter(|v| !v.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    id: Option<String>,
    message: Option<String>,
}

// ============================================================================
// DoClient
// ============================================================================

/// HTTP client for the DigitalOcean droplet endpoints.
pub struct DoClient {
    client: Client,
    base_url: String,
    token: String,
}

impl DoClient {
    /// Client against a custom base URL (useful for testing).
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build()?;
        Ok(Self::from_parts(client, base_url, token))
    }

    fn from_parts(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url).bearer_auth(&self.token)
    }

    /// Map non-success responses to [`ApiError`].
    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        let body = response.json::<ErrorBody>().await.ok();
        let (id, message) = match body {
            Some(b) => (b.id, b.message.unwrap_or_default()),
            None => (None, String::new()),
        };
        Err(ApiError::Status {
            status: status.as_u16(),
            id,
            message,
        })
    }

    async fn droplet_from(response: Response) -> Result<ObservedDroplet, ApiError> {
        let envelope: DropletEnvelope = Self::check(response).await?.json().await?;
        envelope
            .droplet
            .map(ObservedDroplet::from)
            .ok_or(ApiError::EmptyResponse)
    }
}

#[async_trait]
impl DropletApi for DoClient {
    async fn create(&self, req: &DropletCreateRequest) -> Result<ObservedDroplet, ApiError> {
        debug!("Creating droplet {} in {}", req.name, req.region);
        let response = self
            .request(Method::POST, "/v2/droplets")
            .json(req)
            .send()
            .await?;
        Self::droplet_from(response).await
    }

    async fn get(&self, id: u64) -> Result<ObservedDroplet, ApiError> {
        debug!("Getting droplet {}", id);
        let response = self
            .request(Method::GET, &format!("/v2/droplets/{}", id))
            .send()
            .await?;
        Self::droplet_from(response).await
    }

    async fn delete(&self, id: u64) -> Result<(), ApiError> {
        debug!("Deleting droplet {}", id);
        let response = self
            .request(Method::DELETE, &format!("/v2/droplets/{}", id))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// Factory producing [`DoClient`]s that share one connection pool.
#[derive(Clone)]
pub struct DoClientFactory {
    client: Client,
    base_url: String,
}

impl DoClientFactory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl ClientFactory for DoClientFactory {
    fn client(&self, token: &str) -> Box<dyn DropletApi> {
        Box::new(DoClient::from_parts(
            self.client.clone(),
            self.base_url.clone(),
            token,
        ))
    }
}
