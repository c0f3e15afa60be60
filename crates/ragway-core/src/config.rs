//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Paths to all Ragway data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite directory holding `gateway.db` (`data/db/`).
    pub db_dir: PathBuf,
    /// LLM credentials and model defaults (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db_dir: root.join("db"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        std::fs::create_dir_all(&paths.db_dir)?;
        Ok(paths)
    }
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Maximum age of a cache entry that may still be served.
    pub cache_max_age_hours: u64,
    /// Interval between background prune passes over the cache.
    pub cache_prune_interval_secs: u64,
    /// Per-provider-call timeout.
    pub provider_timeout_secs: u64,
    /// Capacity of the metrics write queue before records are dropped.
    pub metrics_queue_capacity: usize,
    /// Capacity of the cache persistence queue before writes are dropped.
    pub cache_queue_capacity: usize,
}

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_CACHE_MAX_AGE_HOURS: u64 = 24;
pub const DEFAULT_CACHE_PRUNE_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

impl GatewayConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        Self::from_lookup(data_dir, |key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_lookup<F>(data_dir: impl AsRef<Path>, lookup: F) -> std::io::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(
            lookup: &dyn Fn(&str) -> Option<String>,
            key: &str,
            default: T,
        ) -> T {
            match lookup(key) {
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    tracing::warn!("Ignoring invalid {}={:?}, using default", key, raw);
                    default
                }),
                None => default,
            }
        }

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port: parsed(&lookup, "PORT", DEFAULT_PORT),
            data_paths,
            cache_max_age_hours: parsed(
                &lookup,
                "RAGWAY_CACHE_MAX_AGE_HOURS",
                DEFAULT_CACHE_MAX_AGE_HOURS,
            ),
            cache_prune_interval_secs: parsed(
                &lookup,
                "RAGWAY_CACHE_PRUNE_INTERVAL_SECS",
                DEFAULT_CACHE_PRUNE_INTERVAL_SECS,
            )
            .max(1),
            provider_timeout_secs: parsed(
                &lookup,
                "RAGWAY_PROVIDER_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT_SECS,
            ),
            metrics_queue_capacity: parsed(&lookup, "RAGWAY_METRICS_QUEUE", DEFAULT_QUEUE_CAPACITY)
                .max(1),
            cache_queue_capacity: parsed(&lookup, "RAGWAY_CACHE_QUEUE", DEFAULT_QUEUE_CAPACITY)
                .max(1),
        })
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_hours.saturating_mul(3600))
    }

    pub fn cache_prune_interval(&self) -> Duration {
        Duration::from_secs(self.cache_prune_interval_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}
