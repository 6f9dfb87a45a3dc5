//! Static fallback source.
//!
//! A small read-only table compiled into the binary and parsed once at
//! construction. Lookups go by handle or by id.

use super::contract::{SourceClient, SourceError, SourceKind};
use crate::entity::{EntityId, EntityRecord, EntityStatus, EntityType, EntityTypeConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

const EMBEDDED_TABLE: &str = include_str!("static_entities.toml");

#[derive(Debug, Deserialize)]
struct StaticTable {
    #[serde(default)]
    entity: Vec<StaticEntry>,
}

#[derive(Debug, Deserialize)]
struct StaticEntry {
    id: EntityId,
    entity_type: EntityType,
    handle: String,
    #[serde(default)]
    status: EntityStatus,
    #[serde(default)]
    created_at: DateTime<Utc>,
    #[serde(default)]
    attributes: Map<String, Value>,
}

impl From<StaticEntry> for EntityRecord {
    fn from(entry: StaticEntry) -> Self {
        EntityRecord {
            id: entry.id,
            entity_type: entry.entity_type,
            handle: entry.handle,
            status: entry.status,
            idempotency_key: None,
            attributes: entry.attributes,
            violations: Vec::new(),
            created_at: entry.created_at,
            updated_at: entry.created_at,
        }
    }
}

pub struct StaticFallbackSource {
    by_handle: HashMap<(EntityType, String), EntityRecord>,
    by_id: HashMap<EntityId, (EntityType, String)>,
}

impl StaticFallbackSource {
    /// Table compiled into the crate.
    pub fn embedded() -> Result<Self, SourceError> {
        Self::from_toml(EMBEDDED_TABLE)
    }

    pub fn from_toml(text: &str) -> Result<Self, SourceError> {
        let table: StaticTable = toml::from_str(text)?;
        Ok(Self::from_records(
            table.entity.into_iter().map(EntityRecord::from).collect(),
        ))
    }

    pub fn from_records(records: Vec<EntityRecord>) -> Self {
        let mut by_handle = HashMap::new();
        let mut by_id = HashMap::new();
        for record in records {
            let key = (record.entity_type, record.handle.clone());
            by_id.insert(record.id, key.clone());
            by_handle.insert(key, record);
        }
        Self { by_handle, by_id }
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }
}

#[async_trait]
impl SourceClient for StaticFallbackSource {
    fn kind(&self) -> SourceKind {
        SourceKind::StaticFallback
    }

    async fn fetch(
        &self,
        entity: &EntityTypeConfig,
        identifier: &str,
    ) -> Result<Option<EntityRecord>, SourceError> {
        if !entity.static_fallback {
            return Ok(None);
        }
        let key = match identifier.parse::<EntityId>() {
            Ok(id) => match self.by_id.get(&id) {
                Some(key) => key.clone(),
                None => return Ok(None),
            },
            Err(_) => (entity.entity_type, identifier.to_string()),
        };
        Ok(self
            .by_handle
            .get(&key)
            .filter(|r| r.entity_type == entity.entity_type)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityTypeRegistry;

    fn config(entity_type: EntityType) -> EntityTypeConfig {
        EntityTypeRegistry::new().get(entity_type).cloned().unwrap()
    }

    #[test]
    fn test_embedded_table_parses() {
        let source = StaticFallbackSource::embedded().unwrap();
        assert!(!source.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_by_handle_and_id() {
        let source = StaticFallbackSource::embedded().unwrap();
        let profiles = config(EntityType::Profile);

        let by_handle = source.fetch(&profiles, "registry").await.unwrap().unwrap();
        let by_id = source
            .fetch(&profiles, &by_handle.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_handle, by_id);
        assert_eq!(by_handle.attributes["display_name"], "Agent Registry");
    }

    #[tokio::test]
    async fn test_handles_are_scoped_by_type() {
        let source = StaticFallbackSource::embedded().unwrap();
        let apps = config(EntityType::Application);
        assert!(source.fetch(&apps, "registry").await.unwrap().is_none());
        assert!(source.fetch(&apps, "registry-console").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_disabled_types_never_hit() {
        let record = EntityRecord::new(EntityType::Webhook, "hook");
        let source = StaticFallbackSource::from_records(vec![record]);
        let webhooks = config(EntityType::Webhook);
        assert!(source.fetch(&webhooks, "hook").await.unwrap().is_none());
    }

    #[test]
    fn test_bad_table_is_an_error() {
        assert!(StaticFallbackSource::from_toml("[[entity]]\nhandle = 3").is_err());
    }
}
