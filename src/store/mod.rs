//! Registry Store
//!
//! Durable persistence for entity records. The core only needs lookup by id,
//! idempotency key and handle, create, and patch-style update; implementations
//! must reject a second record carrying an idempotency key already present in
//! the same collection.

pub mod memory;
pub mod persistence;

use crate::entity::{EntityId, EntityPatch, EntityRecord};
use crate::error::StorageError;
use async_trait::async_trait;

pub use memory::MemoryRegistryStore;
pub use persistence::SledRegistryStore;

/// Registry store interface.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn get(
        &self,
        collection: &str,
        id: &EntityId,
    ) -> Result<Option<EntityRecord>, StorageError>;

    async fn find_by_key(
        &self,
        collection: &str,
        idempotency_key: &str,
    ) -> Result<Option<EntityRecord>, StorageError>;

    async fn find_by_handle(
        &self,
        collection: &str,
        handle: &str,
    ) -> Result<Option<EntityRecord>, StorageError>;

    /// Insert a new record.
    ///
    /// Fails with [`StorageError::DuplicateKey`] when the record's idempotency
    /// key is already taken, and [`StorageError::DuplicateHandle`] when the
    /// handle is.
    async fn create(&self, collection: &str, record: &EntityRecord) -> Result<(), StorageError>;

    /// Apply a patch and return the stored result.
    async fn update(
        &self,
        collection: &str,
        id: &EntityId,
        patch: &EntityPatch,
    ) -> Result<EntityRecord, StorageError>;

    /// All records of a collection in id (creation) order.
    async fn list(&self, collection: &str) -> Result<Vec<EntityRecord>, StorageError>;
}
