//! Remote registry API source.
//!
//! `GET {base_url}/{remote_path}/{identifier}`. A 200 carries the record,
//! bare or wrapped as `{"data": record}`; a 404 means absent. Every other
//! status, transport failure or unparseable body makes the source unavailable.
//! Responses are untrusted and checked before they are handed back.

use super::contract::{SourceClient, SourceError, SourceKind};
use crate::entity::{EntityId, EntityRecord, EntityStatus, EntityType, EntityTypeConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// Largest response body accepted, in bytes.
const MAX_BODY_BYTES: usize = 1 << 20;

/// Wire shape of a remote record. Only `id` and `handle` are mandatory.
#[derive(Debug, Deserialize)]
struct RemoteRecord {
    id: EntityId,
    #[serde(default)]
    entity_type: Option<EntityType>,
    handle: String,
    #[serde(default)]
    status: EntityStatus,
    #[serde(default)]
    attributes: Map<String, Value>,
    #[serde(default)]
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

pub struct RemoteSource {
    client: Client,
    base_url: Url,
}

impl RemoteSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SourceError::Unavailable(format!("invalid base url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::Unavailable(format!(
                "base url cannot carry a path: {}",
                base_url
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("agent-registry/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn record_url(&self, remote_path: &str, identifier: &str) -> Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::Unavailable(format!("bad base url {}", self.base_url)))?
            .pop_if_empty()
            .push(remote_path)
            .push(identifier);
        Ok(url)
    }

    /// Read the body, refusing anything over `MAX_BODY_BYTES` before it is
    /// buffered in full.
    async fn read_capped(mut response: reqwest::Response) -> Result<Vec<u8>, SourceError> {
        let too_large =
            |len: u64| SourceError::InvalidResponse(format!("body of {} bytes exceeds limit", len));
        if let Some(len) = response.content_length() {
            if len > MAX_BODY_BYTES as u64 {
                return Err(too_large(len));
            }
        }
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > MAX_BODY_BYTES {
                return Err(too_large((body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    fn parse_record(entity: &EntityTypeConfig, body: &[u8]) -> Result<EntityRecord, SourceError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| SourceError::InvalidResponse(format!("body is not JSON: {}", e)))?;
        let value = match value {
            Value::Object(mut envelope) if envelope.get("data").is_some_and(Value::is_object) => {
                envelope.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        let remote: RemoteRecord = serde_json::from_value(value)
            .map_err(|e| SourceError::InvalidResponse(format!("malformed record: {}", e)))?;

        let entity_type = remote.entity_type.unwrap_or(entity.entity_type);
        if entity_type != entity.entity_type {
            return Err(SourceError::InvalidResponse(format!(
                "expected {} record, got {}",
                entity.entity_type, entity_type
            )));
        }
        if remote.handle.trim().is_empty() {
            return Err(SourceError::InvalidResponse("empty handle".to_string()));
        }

        Ok(EntityRecord {
            id: remote.id,
            entity_type,
            handle: remote.handle,
            status: remote.status,
            idempotency_key: None,
            attributes: remote.attributes,
            violations: Vec::new(),
            created_at: remote.created_at,
            updated_at: remote.updated_at.unwrap_or(remote.created_at),
        })
    }
}

#[async_trait]
impl SourceClient for RemoteSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }

    async fn fetch(
        &self,
        entity: &EntityTypeConfig,
        identifier: &str,
    ) -> Result<Option<EntityRecord>, SourceError> {
        let url = self.record_url(entity.remote_path, identifier)?;
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "Remote source responded");

        match status {
            StatusCode::OK => {
                let body = Self::read_capped(response).await?;
                Self::parse_record(entity, &body).map(Some)
            }
            StatusCode::NOT_FOUND => Ok(None),
            other => Err(SourceError::Unavailable(format!("HTTP {}", other))),
        }
    }

    /// Any HTTP answer from the base url counts as reachable.
    async fn probe(&self) -> Result<(), SourceError> {
        let response = self.client.get(self.base_url.clone()).send().await?;
        if response.status().is_server_error() {
            return Err(SourceError::Unavailable(format!("HTTP {}", response.status())));
        }
        Ok(())
    }
}
