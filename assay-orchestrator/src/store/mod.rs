//! Durable Record Store
//!
//! Key/value persistence for job records. The store is the only channel
//! through which the launcher, the executor and the status endpoint
//! communicate, so every backend must be usable from independent processes.
//!
//! Three tiers are tried in order, first success wins:
//! 1. `blob`: remote object store, durable and shared across instances
//! 2. `file`: one JSON document on local disk, single-host only
//! 3. `memory`: process-local map, degraded mode

pub mod blob;
pub mod file;
pub mod memory;

pub use blob::BlobStore;
pub use file::FileStore;
pub use memory::MemoryStore;

use assay_core::domain::job::JobRecord;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Once};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised by store backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend configuration is absent; the next tier should be tried
    #[error("Missing environment: {0}")]
    MissingEnvironment(String),

    #[error("Store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Store backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid store key: {0}")]
    InvalidKey(String),

    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    pub fn is_missing_environment(&self) -> bool {
        matches!(self, Self::MissingEnvironment(_))
    }
}

/// Record store contract shared by all tiers
///
/// Reading an unknown key yields `Ok(None)`, never an error.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Which tier this is
    fn backend(&self) -> StoreBackend;

    async fn get(&self, key: &str) -> Result<Option<JobRecord>, StoreError>;

    async fn set(&self, key: &str, record: &JobRecord) -> Result<(), StoreError>;

    /// Deleting an absent key succeeds
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn list_keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Handle passed to every unit; constructed once per process
pub type SharedStore = Arc<dyn RecordStore>;

/// Store tiers, in fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Blob,
    File,
    Memory,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreBackend::Blob => "blob",
            StoreBackend::File => "file",
            StoreBackend::Memory => "memory",
        }
    }

    /// Tiers tried when starting from `self`
    fn chain(self) -> &'static [StoreBackend] {
        match self {
            StoreBackend::Blob => &[StoreBackend::Blob, StoreBackend::File],
            StoreBackend::File => &[StoreBackend::File],
            StoreBackend::Memory => &[],
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blob" => Ok(StoreBackend::Blob),
            "file" => Ok(StoreBackend::File),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// Settings for all store tiers
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// First tier to try; `None` starts at `blob`
    pub backend: Option<StoreBackend>,
    pub blob_url: Option<String>,
    pub blob_token: Option<String>,
    pub blob_store: String,
    pub file_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: None,
            blob_url: None,
            blob_token: None,
            blob_store: "validation-jobs".to_string(),
            file_path: PathBuf::from(".assay/jobs.json"),
        }
    }
}

static MEMORY_FALLBACK_WARNING: Once = Once::new();

/// Opens the first store tier that initializes.
///
/// Open failures never propagate: each one moves on to the next tier and
/// the in-memory map is the last resort.
pub async fn open_store(config: &StoreConfig) -> SharedStore {
    let start = config.backend.unwrap_or(StoreBackend::Blob);

    for tier in start.chain() {
        let opened: Result<SharedStore, StoreError> = match tier {
            StoreBackend::Blob => BlobStore::open(config)
                .await
                .map(|s| Arc::new(s) as SharedStore),
            StoreBackend::File => FileStore::open(&config.file_path).await.map(|s| {
                debug!("Record file: {}", s.path().display());
                Arc::new(s) as SharedStore
            }),
            StoreBackend::Memory => continue,
        };

        match opened {
            Ok(store) => {
                info!("Using {} record store", tier);
                return store;
            }
            Err(e) if e.is_missing_environment() => {
                debug!("{} store not configured: {}", tier, e);
            }
            Err(e) => {
                warn!("Failed to open {} store, trying next tier: {}", tier, e);
            }
        }
    }

    warn_memory_fallback(&MEMORY_FALLBACK_WARNING);

    Arc::new(MemoryStore::new())
}

fn warn_memory_fallback(once: &Once) {
    once.call_once(|| {
        warn!(
            "Using in-memory record store: job state is lost on restart and is not \
             shared between processes"
        );
    });
}
