//! Entity type registration table.
//!
//! Maps each entity type to its storage collection and resolution settings.
//! Built once at startup; there is no runtime loading of per-type modules.

use super::record::EntityType;
use crate::error::ApiError;
use std::collections::HashMap;

/// Static configuration for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeConfig {
    pub entity_type: EntityType,
    /// Collection name in the store and in the validation policy.
    pub collection: &'static str,
    /// Path segment on the remote registry API.
    pub remote_path: &'static str,
    /// Whether the static fallback table is consulted for this type.
    pub static_fallback: bool,
}

const DEFAULT_TABLE: [EntityTypeConfig; 4] = [
    EntityTypeConfig {
        entity_type: EntityType::Profile,
        collection: "profiles",
        remote_path: "profiles",
        static_fallback: true,
    },
    EntityTypeConfig {
        entity_type: EntityType::Creation,
        collection: "creations",
        remote_path: "creations",
        static_fallback: true,
    },
    EntityTypeConfig {
        entity_type: EntityType::Application,
        collection: "applications",
        remote_path: "apps",
        static_fallback: true,
    },
    EntityTypeConfig {
        entity_type: EntityType::Webhook,
        collection: "webhooks",
        remote_path: "webhooks",
        static_fallback: false,
    },
];

/// Registry of entity type configurations.
#[derive(Debug, Clone)]
pub struct EntityTypeRegistry {
    types: HashMap<EntityType, EntityTypeConfig>,
}

impl EntityTypeRegistry {
    /// Create a registry holding the built-in table.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for config in DEFAULT_TABLE {
            registry.register(config);
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Register (or replace) a type configuration.
    pub fn register(&mut self, config: EntityTypeConfig) {
        self.types.insert(config.entity_type, config);
    }

    pub fn get(&self, entity_type: EntityType) -> Option<&EntityTypeConfig> {
        self.types.get(&entity_type)
    }

    pub fn get_or_error(&self, entity_type: EntityType) -> Result<&EntityTypeConfig, ApiError> {
        self.get(entity_type).ok_or_else(|| {
            ApiError::ConfigError(format!("Entity type not registered: {}", entity_type))
        })
    }

    /// Look up the entity type stored in a collection.
    pub fn by_collection(&self, collection: &str) -> Option<&EntityTypeConfig> {
        self.types.values().find(|c| c.collection == collection)
    }

    /// Collection name for a type, falling back to the type name.
    pub fn collection_for(&self, entity_type: EntityType) -> &'static str {
        self.get(entity_type)
            .map(|c| c.collection)
            .unwrap_or_else(|| entity_type.as_str())
    }

    /// All registered configurations, ordered by entity type.
    pub fn list_all(&self) -> Vec<&EntityTypeConfig> {
        let mut all: Vec<_> = self.types.values().collect();
        all.sort_by_key(|c| c.entity_type);
        all
    }

    pub fn collections(&self) -> Vec<&'static str> {
        self.list_all().iter().map(|c| c.collection).collect()
    }
}

impl Default for EntityTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_covers_every_type() {
        let registry = EntityTypeRegistry::new();
        for entity_type in EntityType::ALL {
            assert!(registry.get(entity_type).is_some());
        }
        assert_eq!(registry.list_all().len(), 4);
    }

    #[test]
    fn test_lookup_by_collection() {
        let registry = EntityTypeRegistry::new();
        let config = registry.by_collection("creations").unwrap();
        assert_eq!(config.entity_type, EntityType::Creation);
        assert!(registry.by_collection("galleries").is_none());
    }

    #[test]
    fn test_webhooks_skip_static_fallback() {
        let registry = EntityTypeRegistry::new();
        assert!(!registry.get(EntityType::Webhook).unwrap().static_fallback);
        assert!(registry.get(EntityType::Profile).unwrap().static_fallback);
    }

    #[test]
    fn test_get_or_error_on_empty_registry() {
        let registry = EntityTypeRegistry::empty();
        assert!(registry.get_or_error(EntityType::Profile).is_err());
        assert_eq!(registry.collection_for(EntityType::Profile), "profile");
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = EntityTypeRegistry::new();
        registry.register(EntityTypeConfig {
            entity_type: EntityType::Webhook,
            collection: "webhooks",
            remote_path: "hooks",
            static_fallback: true,
        });
        let config = registry.get(EntityType::Webhook).unwrap();
        assert_eq!(config.remote_path, "hooks");
        assert!(config.static_fallback);
    }
}
