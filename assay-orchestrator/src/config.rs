//! Orchestrator configuration
//!
//! Defines every tunable of the job services: bind address, store tier
//! selection, executor dispatch and the upstream API connection.

use std::path::PathBuf;
use std::time::Duration;

use crate::store::{StoreBackend, StoreConfig};

/// Orchestrator configuration
///
/// Launcher, executor and status endpoint all read the same configuration;
/// they may still be deployed as separate processes.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Durable record store settings
    pub store: StoreConfig,

    /// Base URL of a remote executor (`{url}/jobs/execute`).
    /// When unset, jobs execute on a task of this process.
    pub executor_url: Option<String>,

    /// How long the launcher waits for the executor to accept a trigger
    pub dispatch_timeout: Duration,

    /// Base URL that relative job endpoints are joined onto
    pub upstream_base_url: Option<String>,

    /// Hard ceiling for a single upstream call
    pub upstream_timeout: Duration,

    /// Delete terminal records as soon as a status read returns them
    pub cleanup_on_read: bool,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - ASSAY_BIND_ADDR (default: 0.0.0.0:8080)
    /// - ASSAY_STORE_BACKEND (blob | file | memory, pins the first tier tried)
    /// - ASSAY_BLOB_URL, ASSAY_BLOB_TOKEN, ASSAY_BLOB_STORE (default: validation-jobs)
    /// - ASSAY_STORE_FILE (default: .assay/jobs.json)
    /// - ASSAY_EXECUTOR_URL
    /// - ASSAY_DISPATCH_TIMEOUT_SECS (default: 10)
    /// - ASSAY_UPSTREAM_BASE_URL
    /// - ASSAY_UPSTREAM_TIMEOUT_SECS (default: 900)
    /// - ASSAY_CLEANUP_ON_READ (default: false)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let backend = match var("ASSAY_STORE_BACKEND") {
            Some(name) => Some(
                name.parse::<StoreBackend>()
                    .map_err(|e| anyhow::anyhow!("ASSAY_STORE_BACKEND: {}", e))?,
            ),
            None => None,
        };

        let store = StoreConfig {
            backend,
            blob_url: var("ASSAY_BLOB_URL"),
            blob_token: var("ASSAY_BLOB_TOKEN"),
            blob_store: var("ASSAY_BLOB_STORE").unwrap_or_else(|| "validation-jobs".to_string()),
            file_path: var("ASSAY_STORE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".assay/jobs.json")),
        };

        let dispatch_timeout = var("ASSAY_DISPATCH_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        let upstream_timeout = var("ASSAY_UPSTREAM_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(900));

        let cleanup_on_read = var("ASSAY_CLEANUP_ON_READ")
            .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            bind_addr: var("ASSAY_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            store,
            executor_url: var("ASSAY_EXECUTOR_URL").map(|u| u.trim_end_matches('/').to_string()),
            dispatch_timeout,
            upstream_base_url: var("ASSAY_UPSTREAM_BASE_URL"),
            upstream_timeout,
            cleanup_on_read,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        for (name, url) in [
            ("executor_url", &self.executor_url),
            ("upstream_base_url", &self.upstream_base_url),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    anyhow::bail!("{} must start with http:// or https://", name);
                }
            }
        }

        if self.dispatch_timeout.is_zero() {
            anyhow::bail!("dispatch_timeout must be greater than 0");
        }

        if self.upstream_timeout.is_zero() {
            anyhow::bail!("upstream_timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            store: StoreConfig::default(),
            executor_url: None,
            dispatch_timeout: Duration::from_secs(10),
            upstream_base_url: None,
            upstream_timeout: Duration::from_secs(900),
            cleanup_on_read: false,
        }
    }
}
