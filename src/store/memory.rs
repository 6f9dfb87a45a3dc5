//! In-process store used by tests and ephemeral runs.

use super::RegistryStore;
use crate::entity::{EntityId, EntityPatch, EntityRecord};
use crate::error::StorageError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct CollectionData {
    records: HashMap<EntityId, EntityRecord>,
    keys: HashMap<String, EntityId>,
    handles: HashMap<String, EntityId>,
}

/// HashMap-backed [`RegistryStore`].
#[derive(Default)]
pub struct MemoryRegistryStore {
    collections: RwLock<HashMap<String, CollectionData>>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|c| c.records.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    async fn get(
        &self,
        collection: &str,
        id: &EntityId,
    ) -> Result<Option<EntityRecord>, StorageError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.records.get(id).cloned()))
    }

    async fn find_by_key(
        &self,
        collection: &str,
        idempotency_key: &str,
    ) -> Result<Option<EntityRecord>, StorageError> {
        let collections = self.collections.read();
        Ok(collections.get(collection).and_then(|c| {
            c.keys
                .get(idempotency_key)
                .and_then(|id| c.records.get(id).cloned())
        }))
    }

    async fn find_by_handle(
        &self,
        collection: &str,
        handle: &str,
    ) -> Result<Option<EntityRecord>, StorageError> {
        let collections = self.collections.read();
        Ok(collections.get(collection).and_then(|c| {
            c.handles
                .get(handle)
                .and_then(|id| c.records.get(id).cloned())
        }))
    }

    async fn create(&self, collection: &str, record: &EntityRecord) -> Result<(), StorageError> {
        let mut collections = self.collections.write();
        let data = collections.entry(collection.to_string()).or_default();

        if let Some(key) = &record.idempotency_key {
            if data.keys.contains_key(key) {
                return Err(StorageError::DuplicateKey {
                    collection: collection.to_string(),
                    key: key.clone(),
                });
            }
        }
        if data.handles.contains_key(&record.handle) {
            return Err(StorageError::DuplicateHandle {
                collection: collection.to_string(),
                handle: record.handle.clone(),
            });
        }

        if let Some(key) = &record.idempotency_key {
            data.keys.insert(key.clone(), record.id);
        }
        data.handles.insert(record.handle.clone(), record.id);
        data.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &EntityId,
        patch: &EntityPatch,
    ) -> Result<EntityRecord, StorageError> {
        let mut collections = self.collections.write();
        let not_found = || StorageError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        };
        let data = collections.get_mut(collection).ok_or_else(not_found)?;
        let current = data.records.get(id).ok_or_else(not_found)?;
        let updated = current.patched(patch);

        if updated.handle != current.handle {
            if data.handles.contains_key(&updated.handle) {
                return Err(StorageError::DuplicateHandle {
                    collection: collection.to_string(),
                    handle: updated.handle.clone(),
                });
            }
            data.handles.remove(&current.handle);
            data.handles.insert(updated.handle.clone(), *id);
        }

        data.records.insert(*id, updated.clone());
        Ok(updated)
    }

    async fn list(&self, collection: &str) -> Result<Vec<EntityRecord>, StorageError> {
        let collections = self.collections.read();
        let mut records: Vec<EntityRecord> = collections
            .get(collection)
            .map(|c| c.records.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}
