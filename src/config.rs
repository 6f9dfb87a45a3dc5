//! Configuration
//!
//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `REGISTRY__*` environment variables. The merged result is validated before
//! anything is built from it; an invalid configuration is fatal.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use crate::logging::LoggingConfig;
pub use crate::validation::ValidationPolicy;
pub use facade::ConfigLoader;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub validation: ValidationPolicy,
    pub resolution: ResolutionConfig,
    pub import: ImportConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    /// Upper bound on concurrent resolutions and on concurrently processed
    /// import items.
    pub concurrency_limit: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            validation: ValidationPolicy::default(),
            resolution: ResolutionConfig::default(),
            import: ImportConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            concurrency_limit: 8,
        }
    }
}

/// Resolver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Bound on a single source attempt.
    pub timeout_ms: u64,
    /// Deadline applied to a resolution when the caller gives none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
    /// Base URL of the remote registry API; no remote source when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    /// Whether the embedded static table is consulted at all.
    pub static_fallback: bool,
}

impl ResolutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn default_deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            deadline_ms: None,
            remote_url: None,
            static_fallback: true,
        }
    }
}

/// Bulk import settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Extra attempts after a transient store failure.
    pub retry_budget: usize,
    pub retry_delay_ms: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            retry_budget: 3,
            retry_delay_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    Sled,
}

/// Registry store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database directory; the platform data directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolve_path(&self) -> Result<PathBuf, crate::error::ApiError> {
        match &self.path {
            Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
            _ => paths::default_store_path(),
        }
    }
}

impl RegistryConfig {
    /// Check values serde cannot.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency_limit == 0 {
            return Err("concurrency_limit must be at least 1".to_string());
        }
        if self.resolution.timeout_ms == 0 {
            return Err("resolution.timeout_ms must be greater than 0".to_string());
        }
        if self.resolution.deadline_ms == Some(0) {
            return Err("resolution.deadline_ms must be greater than 0".to_string());
        }
        if let Some(remote) = &self.resolution.remote_url {
            let url = Url::parse(remote)
                .map_err(|e| format!("Invalid resolution.remote_url {}: {}", remote, e))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(format!(
                    "resolution.remote_url must be http or https: {}",
                    remote
                ));
            }
        }
        if !matches!(self.logging.format.as_str(), "json" | "text") {
            return Err(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                self.logging.format
            ));
        }
        Ok(())
    }
}
