//! MergeService: orchestrates sources, deserializes and validates RegistryConfig.

use crate::config::sources::{environment, file};
use crate::config::RegistryConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};
use std::path::Path;
use tracing::debug;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> working-dir file -> environment (highest).
    pub fn load(working_dir: &Path) -> Result<RegistryConfig, ConfigError> {
        let builder = file::add_working_dir(Config::builder(), working_dir)?;
        Self::finish(builder)
    }

    /// Precedence: defaults (lowest) -> given file -> environment (highest).
    pub fn load_from_file(path: &Path) -> Result<RegistryConfig, ConfigError> {
        let builder = file::add_required(Config::builder(), path)?;
        Self::finish(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<RegistryConfig, ConfigError> {
        let builder = environment::add_to_builder(builder)?;
        let config: RegistryConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(ConfigError::Message)?;
        debug!(
            default_mode = %config.validation.default_mode,
            concurrency_limit = config.concurrency_limit,
            "Configuration loaded"
        );
        Ok(config)
    }
}
