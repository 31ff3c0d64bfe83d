//! Droplet record types.
//!
//! A [`Droplet`] is the desired-state document for one provider compute
//! instance: metadata (including the external identity), the desired
//! parameters, and the last observed status.

pub mod condition;
pub mod identity;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use condition::{Condition, ConditionReason, ConditionStatus, ConditionType, Conditions};
pub use identity::{Identity, IdentityError};

/// Kind name of Droplet records.
pub const DROPLET_KIND: &str = "Droplet";

/// Provider configuration used when a record does not name one.
pub const DEFAULT_PROVIDER_CONFIG: &str = "default";

/// Record metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    /// External identity (empty, user-chosen name, or provider ID).
    #[serde(default)]
    pub external_name: Identity,
    /// Set when the record should be removed.
    #[serde(default)]
    pub deletion_requested: bool,
}

/// What happens to the droplet when the record is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    #[default]
    Delete,
    Orphan,
}

/// Reference to the provider configuration holding credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfigReference {
    pub name: String,
}

impl Default for ProviderConfigReference {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROVIDER_CONFIG.to_string(),
        }
    }
}

/// Desired droplet parameters.
///
/// `region`, `size` and `image` are required. Everything else is optional and
/// may be filled in from the provider after the first observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropletParameters {
    pub region: String,
    pub size: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backups: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_networking: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_uuid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropletSpec {
    pub for_provider: DropletParameters,
    #[serde(default)]
    pub provider_config_ref: ProviderConfigReference,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

/// Lifecycle status reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DropletState {
    #[default]
    New,
    Active,
    Off,
    Archived,
    /// Anything else the provider reports, kept verbatim.
    Other(String),
}

impl From<String> for DropletState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "new" => DropletState::New,
            "active" => DropletState::Active,
            "off" => DropletState::Off,
            "archive" | "archived" => DropletState::Archived,
            _ => DropletState::Other(s),
        }
    }
}

impl From<DropletState> for String {
    fn from(s: DropletState) -> Self {
        s.to_string()
    }
}

impl fmt::Display for DropletState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropletState::New => f.write_str("new"),
            DropletState::Active => f.write_str("active"),
            DropletState::Off => f.write_str("off"),
            DropletState::Archived => f.write_str("archived"),
            DropletState::Other(s) => f.write_str(s),
        }
    }
}

/// Last-known external state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropletObservation {
    /// Provider ID; zero until the droplet was observed once.
    #[serde(default)]
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: DropletState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropletStatus {
    #[serde(default)]
    pub at_provider: DropletObservation,
    #[serde(default)]
    pub conditions: Conditions,
}

/// Desired-state record for one droplet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Droplet {
    pub metadata: ObjectMeta,
    pub spec: DropletSpec,
    #[serde(default)]
    pub status: DropletStatus,
}

impl Droplet {
    /// New record with an empty identity.
    pub fn new(name: impl Into<String>, for_provider: DropletParameters) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                ..Default::default()
            },
            spec: DropletSpec {
                for_provider,
                ..Default::default()
            },
            status: DropletStatus::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn external_name(&self) -> &Identity {
        &self.metadata.external_name
    }
}

/// Record handed to the external client by the engine.
///
/// The engine is generic over resource kinds; anything that is not a
/// [`Droplet`] is rejected at the operation boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Managed {
    Droplet(Droplet),
    #[serde(untagged)]
    Other { kind: String, name: String },
}

impl Managed {
    /// Kind name of the wrapped record.
    pub fn kind(&self) -> &str {
        match self {
            Managed::Droplet(_) => DROPLET_KIND,
            Managed::Other { kind, .. } => kind,
        }
    }

    pub fn as_droplet(&self) -> Option<&Droplet> {
        match self {
            Managed::Droplet(d) => Some(d),
            Managed::Other { .. } => None,
        }
    }
}

impl From<Droplet> for Managed {
    fn from(d: Droplet) -> Self {
        Managed::Droplet(d)
    }
}
