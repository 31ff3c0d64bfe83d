//! External identity of a Droplet record.
//!
//! The identity lives in the record as a plain string. Before creation it is
//! empty or holds a user-chosen name; after creation it holds the numeric ID
//! the provider assigned. [`Identity`] makes those three states explicit and
//! only allows moving forward into [`Identity::Assigned`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors raised when an identity transition is not allowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The record already carries a provider ID.
    #[error("external name already holds droplet ID {current}")]
    AlreadyAssigned { current: u64 },

    /// Providers never hand out ID zero.
    #[error("provider returned an invalid droplet ID 0")]
    InvalidId,
}

/// Identity state of a Droplet record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Nothing set yet.
    #[default]
    Unassigned,
    /// A human-chosen name, used as the droplet name until the provider ID is known.
    PendingNumeric(String),
    /// Provider-assigned numeric ID.
    Assigned(u64),
}

impl Identity {
    /// Parse the stored external-name string.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Identity::Unassigned;
        }
        match raw.parse::<u64>() {
            Ok(id) if id > 0 => Identity::Assigned(id),
            _ => Identity::PendingNumeric(raw.to_string()),
        }
    }

    pub fn is_unassigned(&self) -> bool {
        matches!(self, Identity::Unassigned)
    }

    /// Move to [`Identity::Assigned`].
    ///
    /// Only `Unassigned -> Assigned` and `PendingNumeric -> Assigned` are valid.
    pub fn assign(&self, id: u64) -> Result<Identity, IdentityError> {
        if id == 0 {
            return Err(IdentityError::InvalidId);
        }
        match self {
            Identity::Unassigned | Identity::PendingNumeric(_) => Ok(Identity::Assigned(id)),
            Identity::Assigned(current) => {
                Err(IdentityError::AlreadyAssigned { current: *current })
            }
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Unassigned => Ok(()),
            Identity::PendingNumeric(name) => f.write_str(name),
            Identity::Assigned(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for Identity {
    fn from(raw: &str) -> Self {
        Identity::parse(raw)
    }
}

// Stored as the bare string so records stay compatible with the annotation form.
impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Identity::parse(&raw))
    }
}
