//! Source client contract.

use crate::entity::{EntityRecord, EntityTypeConfig};
use crate::error::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of source. Declaration order is resolution precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Primary,
    Remote,
    StaticFallback,
}

impl SourceKind {
    pub const PRECEDENCE: [SourceKind; 3] = [
        SourceKind::Primary,
        SourceKind::Remote,
        SourceKind::StaticFallback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Primary => "primary",
            SourceKind::Remote => "remote",
            SourceKind::StaticFallback => "static_fallback",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a source could not answer.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Store error: {0}")]
    Store(#[from] StorageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Static table error: {0}")]
    StaticTable(#[from] toml::de::Error),
}

/// A place records can be fetched from.
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch a record by id or handle.
    ///
    /// `Ok(None)` means the source answered and holds no such record; any
    /// `Err` means the source could not answer.
    async fn fetch(
        &self,
        entity: &EntityTypeConfig,
        identifier: &str,
    ) -> Result<Option<EntityRecord>, SourceError>;

    /// Cheap reachability check for health reporting.
    async fn probe(&self) -> Result<(), SourceError> {
        Ok(())
    }
}
