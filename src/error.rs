//! Error types for the registry core.

use crate::validation::Violation;
use thiserror::Error;

/// Storage-level errors raised by [`crate::store::RegistryStore`] implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Idempotency key already present in {collection}: {key}")]
    DuplicateKey { collection: String, key: String },

    #[error("Handle already taken in {collection}: {handle}")]
    DuplicateHandle { collection: String, handle: String },

    /// Transient failure; callers may retry.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt record in {collection}: {reason}")]
    Corrupt { collection: String, reason: String },
}

impl StorageError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_) | StorageError::IoError(_))
    }
}

/// Top-level API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Write to {collection} rejected: {}", format_violations(.violations))]
    ValidationRejected {
        collection: String,
        violations: Vec<Violation>,
    },

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Source error: {0}")]
    SourceError(#[from] crate::source::SourceError),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} ({})", v.field, v.message))
        .collect::<Vec<_>>()
        .join(", ")
}
