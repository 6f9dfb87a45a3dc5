//! Environment variable source: REGISTRY__* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

pub const ENV_PREFIX: &str = "REGISTRY";

/// Add the environment overlay to a builder.
///
/// `REGISTRY__VALIDATION__EMERGENCY_BYPASS=true` sets
/// `validation.emergency_bypass`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    ))
}
