//! ConfigLoader facade delegating to the merge service.

use super::merge::service::MergeService;
use super::RegistryConfig;
use config::ConfigError;
use std::path::Path;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "registry.toml";

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `registry.toml` from `working_dir` if present, then the environment.
    pub fn load(working_dir: &Path) -> Result<RegistryConfig, ConfigError> {
        MergeService::load(working_dir)
    }

    /// Load a specific file (which must exist), then the environment.
    pub fn load_from_file(path: &Path) -> Result<RegistryConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    /// Explicit path when given, otherwise the working directory lookup.
    pub fn load_with_override(
        explicit: Option<&Path>,
        working_dir: &Path,
    ) -> Result<RegistryConfig, ConfigError> {
        match explicit {
            Some(path) => Self::load_from_file(path),
            None => Self::load(working_dir),
        }
    }

    /// Create default configuration.
    pub fn default() -> RegistryConfig {
        RegistryConfig::default()
    }
}
