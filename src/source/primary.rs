//! Primary source backed by the registry store.

use super::contract::{SourceClient, SourceError, SourceKind};
use crate::entity::{EntityId, EntityRecord, EntityTypeConfig};
use crate::store::RegistryStore;
use async_trait::async_trait;
use std::sync::Arc;

pub struct StoreSource {
    store: Arc<dyn RegistryStore>,
}

impl StoreSource {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SourceClient for StoreSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Primary
    }

    /// Identifiers that parse as an [`EntityId`] are looked up by id, anything
    /// else by handle.
    async fn fetch(
        &self,
        entity: &EntityTypeConfig,
        identifier: &str,
    ) -> Result<Option<EntityRecord>, SourceError> {
        let record = match identifier.parse::<EntityId>() {
            Ok(id) => self.store.get(entity.collection, &id).await?,
            Err(_) => self.store.find_by_handle(entity.collection, identifier).await?,
        };
        Ok(record.filter(|r| r.entity_type == entity.entity_type))
    }

    async fn probe(&self) -> Result<(), SourceError> {
        self.store.find_by_handle("profiles", "").await?;
        Ok(())
    }
}
