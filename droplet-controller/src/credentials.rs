//! Credential sources for provider API tokens.
//!
//! A Droplet record names a provider configuration; a [`CredentialSource`]
//! turns that reference into an API token. The token is opaque to the rest of
//! the controller.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::resource::ProviderConfigReference;

/// Errors raised while resolving a provider token.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("provider config {0} has no credentials")]
    Missing(String),

    #[error("credentials for provider config {0} are empty")]
    Empty(String),

    #[error("provider config name {0:?} is not a plain file name")]
    InvalidName(String),

    #[error("cannot read credentials for provider config {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Resolves API tokens from provider configuration references.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn resolve(&self, config: &ProviderConfigReference) -> Result<String, CredentialError>;
}

fn non_empty(name: &str, token: &str) -> Result<String, CredentialError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(CredentialError::Empty(name.to_string()));
    }
    Ok(token.to_string())
}

/// Same token for every provider configuration.
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn resolve(&self, config: &ProviderConfigReference) -> Result<String, CredentialError> {
        non_empty(&config.name, &self.token)
    }
}

/// Token read from an environment variable.
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl CredentialSource for EnvCredentials {
    async fn resolve(&self, config: &ProviderConfigReference) -> Result<String, CredentialError> {
        debug!("Resolving credentials for {} from ${}", config.name, self.var);
        let token =
            std::env::var(&self.var).map_err(|_| CredentialError::Missing(config.name.clone()))?;
        non_empty(&config.name, &token)
    }
}

/// One token file per provider configuration: `<dir>/<config name>`.
pub struct DirectoryCredentials {
    dir: PathBuf,
}

impl DirectoryCredentials {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Token file for `name`. The name must stay inside the directory.
    fn token_path(&self, name: &str) -> Result<PathBuf, CredentialError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => {
                Ok(self.dir.join(name))
            }
            _ => Err(CredentialError::InvalidName(name.to_string())),
        }
    }
}

#[async_trait]
impl CredentialSource for DirectoryCredentials {
    async fn resolve(&self, config: &ProviderConfigReference) -> Result<String, CredentialError> {
        let path = self.token_path(&config.name)?;
        debug!("Resolving credentials for {} from {}", config.name, path.display());
        let token = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialError::Missing(config.name.clone()));
            }
            Err(source) => {
                return Err(CredentialError::Io {
                    name: config.name.clone(),
                    source,
                });
            }
        };
        non_empty(&config.name, &token)
    }
}
