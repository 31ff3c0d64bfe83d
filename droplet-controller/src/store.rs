//! Record store boundary.
//!
//! The declarative store owns Droplet records. The controller reads a record
//! at the start of a pass and writes it back at the end; Observe also writes
//! synchronously when late initialization changed the desired parameters.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::resource::Droplet;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Record belongs to a different name than the store holds.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence for Droplet records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get a record by name.
    async fn get(&self, name: &str) -> Result<Droplet>;

    /// Persist a record, replacing the stored copy.
    async fn update(&self, record: &Droplet) -> Result<()>;
}

/// A single record kept as a JSON file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the record without checking its name.
    pub async fn load(&self) -> Result<Droplet> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&raw)?)
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn get(&self, name: &str) -> Result<Droplet> {
        let record = self.load().await?;
        if record.name() != name {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(record)
    }

    async fn update(&self, record: &Droplet) -> Result<()> {
        if let Ok(existing) = self.load().await {
            if existing.name() != record.name() {
                return Err(StoreError::Conflict(format!(
                    "{} holds {}, not {}",
                    self.path.display(),
                    existing.name(),
                    record.name()
                )));
            }
        }

        // Write to a sibling and rename so readers never see a partial file
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Persisted record {} to {}", record.name(), self.path.display());
        Ok(())
    }
}

/// In-memory store keyed by record name.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Droplet>>,
    updates: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with one record.
    pub fn with_record(record: Droplet) -> Self {
        let store = Self::new();
        store.insert(record);
        store
    }

    pub fn insert(&self, record: Droplet) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(record.name().to_string(), record);
    }

    /// Number of successful `update` calls.
    pub fn update_count(&self) -> u64 {
        *self.updates.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, name: &str) -> Result<Droplet> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn update(&self, record: &Droplet) -> Result<()> {
        self.insert(record.clone());
        *self.updates.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
