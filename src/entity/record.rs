//! Entity records and patches.

use super::id::EntityId;
use crate::validation::Violation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of agent tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Profile,
    Creation,
    Application,
    Webhook,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Profile,
        EntityType::Creation,
        EntityType::Application,
        EntityType::Webhook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Profile => "profile",
            EntityType::Creation => "creation",
            EntityType::Application => "application",
            EntityType::Webhook => "webhook",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "profile" | "profiles" => Ok(EntityType::Profile),
            "creation" | "creations" => Ok(EntityType::Creation),
            "application" | "applications" => Ok(EntityType::Application),
            "webhook" | "webhooks" => Ok(EntityType::Webhook),
            other => Err(format!("Unknown entity type: {}", other)),
        }
    }
}

/// Lifecycle status. Records are archived, never physically deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Draft,
    #[default]
    Active,
    Suspended,
    Archived,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Draft => "draft",
            EntityStatus::Active => "active",
            EntityStatus::Suspended => "suspended",
            EntityStatus::Archived => "archived",
        }
    }
}

/// A registry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub entity_type: EntityType,
    pub handle: String,
    #[serde(default)]
    pub status: EntityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Display attributes (title, display name, url, ...).
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Violations accepted under WARN mode when the record was written.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRecord {
    /// Create a new active record with a freshly generated id.
    pub fn new(entity_type: EntityType, handle: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::generate(),
            entity_type,
            handle: handle.into(),
            status: EntityStatus::Active,
            idempotency_key: None,
            attributes: Map::new(),
            violations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn is_archived(&self) -> bool {
        self.status == EntityStatus::Archived
    }

    /// The payload the validation gate sees for this record: its attributes
    /// plus handle and status.
    pub fn to_payload(&self) -> Value {
        let mut payload = self.attributes.clone();
        payload.insert("handle".to_string(), Value::String(self.handle.clone()));
        payload.insert(
            "status".to_string(),
            Value::String(self.status.as_str().to_string()),
        );
        Value::Object(payload)
    }

    /// Apply a patch, returning the updated record. `id` and `created_at`
    /// never change.
    pub fn patched(&self, patch: &EntityPatch) -> Self {
        let mut next = self.clone();
        if let Some(handle) = &patch.handle {
            next.handle = handle.clone();
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        for (key, value) in &patch.attributes {
            if value.is_null() {
                next.attributes.remove(key);
            } else {
                next.attributes.insert(key.clone(), value.clone());
            }
        }
        if let Some(violations) = &patch.violations {
            next.violations = violations.clone();
        }
        next.updated_at = Utc::now();
        next
    }
}

/// Partial update. Attributes are merged key by key; a JSON `null` removes the key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EntityStatus>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Replaces the recorded warnings when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<Violation>>,
}

impl EntityPatch {
    pub fn status(status: EntityStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patch_merges_and_removes_attributes() {
        let record = EntityRecord::new(EntityType::Profile, "ada")
            .with_attribute("display_name", "Ada")
            .with_attribute("bio", "old");

        let mut patch = EntityPatch::default();
        patch.attributes.insert("bio".to_string(), Value::Null);
        patch
            .attributes
            .insert("display_name".to_string(), json!("Ada L."));

        let updated = record.patched(&patch);
        assert_eq!(updated.id, record.id);
        assert_eq!(updated.created_at, record.created_at);
        assert_eq!(updated.attributes.get("display_name"), Some(&json!("Ada L.")));
        assert!(updated.attributes.get("bio").is_none());
    }

    #[test]
    fn test_archive_via_patch() {
        let record = EntityRecord::new(EntityType::Webhook, "hook");
        let archived = record.patched(&EntityPatch::status(EntityStatus::Archived));
        assert!(archived.is_archived());
        assert!(!record.is_archived());
    }

    #[test]
    fn test_payload_includes_handle_and_status() {
        let record = EntityRecord::new(EntityType::Application, "app").with_attribute("name", "App");
        let payload = record.to_payload();
        assert_eq!(payload["handle"], json!("app"));
        assert_eq!(payload["status"], json!("active"));
        assert_eq!(payload["name"], json!("App"));
    }

    #[test]
    fn test_entity_type_parsing_accepts_collection_names() {
        assert_eq!("creations".parse::<EntityType>().unwrap(), EntityType::Creation);
        assert_eq!("Profile".parse::<EntityType>().unwrap(), EntityType::Profile);
        assert!("gallery".parse::<EntityType>().is_err());
    }
}
