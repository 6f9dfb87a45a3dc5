//! Platform directories for registry data and state.

use crate::error::ApiError;
use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Result<ProjectDirs, ApiError> {
    ProjectDirs::from("", "", "agent-registry").ok_or_else(|| {
        ApiError::ConfigError(
            "Could not determine platform directories (HOME not set)".to_string(),
        )
    })
}

/// Default sled directory: `<data dir>/store`.
pub fn default_store_path() -> Result<PathBuf, ApiError> {
    Ok(project_dirs()?.data_dir().join("store"))
}

/// Platform state directory, used for the default log file.
///
/// Falls back to the data directory on platforms without a state directory.
pub fn state_dir() -> Result<PathBuf, ApiError> {
    let dirs = project_dirs()?;
    Ok(dirs
        .state_dir()
        .unwrap_or_else(|| dirs.data_local_dir())
        .to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_path_is_scoped() {
        let path = default_store_path().unwrap();
        assert!(path.ends_with("store"));
        assert!(path.to_string_lossy().contains("agent-registry"));
    }
}
