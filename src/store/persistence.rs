//! Sled-backed registry store.
//!
//! Each collection owns three trees: `{collection}/records` (id → JSON record),
//! `{collection}/keys` (idempotency key → id) and `{collection}/handles`
//! (handle → id). Writes touching more than one tree run in a sled
//! transaction so a key is never claimed without its record.

use super::RegistryStore;
use crate::entity::{EntityId, EntityPatch, EntityRecord};
use crate::error::StorageError;
use async_trait::async_trait;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::path::Path;
use std::str::FromStr;

/// Persistent [`RegistryStore`] on top of sled.
pub struct SledRegistryStore {
    db: sled::Db,
}

struct CollectionTrees {
    records: sled::Tree,
    keys: sled::Tree,
    handles: sled::Tree,
}

impl SledRegistryStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open a throwaway store that is removed on drop.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn trees(&self, collection: &str) -> Result<CollectionTrees, StorageError> {
        Ok(CollectionTrees {
            records: self.db.open_tree(format!("{}/records", collection))?,
            keys: self.db.open_tree(format!("{}/keys", collection))?,
            handles: self.db.open_tree(format!("{}/handles", collection))?,
        })
    }

    fn decode(collection: &str, bytes: &[u8]) -> Result<EntityRecord, StorageError> {
        serde_json::from_slice(bytes).map_err(|e| StorageError::Corrupt {
            collection: collection.to_string(),
            reason: e.to_string(),
        })
    }

    fn decode_id(collection: &str, bytes: &[u8]) -> Result<EntityId, StorageError> {
        let text = std::str::from_utf8(bytes).map_err(|e| StorageError::Corrupt {
            collection: collection.to_string(),
            reason: e.to_string(),
        })?;
        EntityId::from_str(text).map_err(|e| StorageError::Corrupt {
            collection: collection.to_string(),
            reason: e.to_string(),
        })
    }

    fn get_by_index(
        &self,
        collection: &str,
        index: &sled::Tree,
        records: &sled::Tree,
        lookup: &str,
    ) -> Result<Option<EntityRecord>, StorageError> {
        let Some(id_bytes) = index.get(lookup.as_bytes())? else {
            return Ok(None);
        };
        let id = Self::decode_id(collection, &id_bytes)?;
        match records.get(id.as_uuid().as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(collection, &bytes)?)),
            None => Ok(None),
        }
    }
}

fn flatten<T>(result: Result<T, TransactionError<StorageError>>) -> Result<T, StorageError> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(StorageError::Sled(e)),
    }
}

#[async_trait]
impl RegistryStore for SledRegistryStore {
    async fn get(
        &self,
        collection: &str,
        id: &EntityId,
    ) -> Result<Option<EntityRecord>, StorageError> {
        let trees = self.trees(collection)?;
        match trees.records.get(id.as_uuid().as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(collection, &bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_by_key(
        &self,
        collection: &str,
        idempotency_key: &str,
    ) -> Result<Option<EntityRecord>, StorageError> {
        let trees = self.trees(collection)?;
        self.get_by_index(collection, &trees.keys, &trees.records, idempotency_key)
    }

    async fn find_by_handle(
        &self,
        collection: &str,
        handle: &str,
    ) -> Result<Option<EntityRecord>, StorageError> {
        let trees = self.trees(collection)?;
        self.get_by_index(collection, &trees.handles, &trees.records, handle)
    }

    async fn create(&self, collection: &str, record: &EntityRecord) -> Result<(), StorageError> {
        let trees = self.trees(collection)?;
        let value = serde_json::to_vec(record)?;
        let id_key = record.id.as_uuid().as_bytes().to_vec();
        let id_text = record.id.to_string();

        let result = (&trees.records, &trees.keys, &trees.handles).transaction(
            |(records, keys, handles)| {
                if let Some(key) = &record.idempotency_key {
                    if keys.get(key.as_bytes())?.is_some() {
                        return Err(ConflictableTransactionError::Abort(
                            StorageError::DuplicateKey {
                                collection: collection.to_string(),
                                key: key.clone(),
                            },
                        ));
                    }
                    keys.insert(key.as_bytes(), id_text.as_bytes())?;
                }
                if handles.get(record.handle.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        StorageError::DuplicateHandle {
                            collection: collection.to_string(),
                            handle: record.handle.clone(),
                        },
                    ));
                }
                handles.insert(record.handle.as_bytes(), id_text.as_bytes())?;
                records.insert(id_key.as_slice(), value.as_slice())?;
                Ok(())
            },
        );
        flatten(result)
    }

    async fn update(
        &self,
        collection: &str,
        id: &EntityId,
        patch: &EntityPatch,
    ) -> Result<EntityRecord, StorageError> {
        let trees = self.trees(collection)?;
        let id_key = id.as_uuid().as_bytes().to_vec();
        let id_text = id.to_string();

        let result = (&trees.records, &trees.handles).transaction(|(records, handles)| {
            let Some(bytes) = records.get(id_key.as_slice())? else {
                return Err(ConflictableTransactionError::Abort(StorageError::NotFound {
                    collection: collection.to_string(),
                    id: id_text.clone(),
                }));
            };
            let current =
                Self::decode(collection, &bytes).map_err(ConflictableTransactionError::Abort)?;
            let updated = current.patched(patch);

            if updated.handle != current.handle {
                if handles.get(updated.handle.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        StorageError::DuplicateHandle {
                            collection: collection.to_string(),
                            handle: updated.handle.clone(),
                        },
                    ));
                }
                handles.remove(current.handle.as_bytes())?;
                handles.insert(updated.handle.as_bytes(), id_text.as_bytes())?;
            }

            let value = serde_json::to_vec(&updated)
                .map_err(|e| ConflictableTransactionError::Abort(StorageError::from(e)))?;
            records.insert(id_key.as_slice(), value)?;
            Ok(updated)
        });
        flatten(result)
    }

    async fn list(&self, collection: &str) -> Result<Vec<EntityRecord>, StorageError> {
        let trees = self.trees(collection)?;
        let mut records = Vec::new();
        for entry in trees.records.iter() {
            let (_, bytes) = entry?;
            records.push(Self::decode(collection, &bytes)?);
        }
        Ok(records)
    }
}
