//! Generic storage trait.
//!
//! Defines the interface for the type-tagged JSON document table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::storage::{Actor, AuditMetadata, StorageType};

use super::error::StorageResult;

/// Raw row of the generic storage table, payload still undecoded.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub id: Uuid,
    pub storage_type: StorageType,
    pub data: serde_json::Value,
    pub audit: AuditMetadata,
}

/// Storage interface for generic type-tagged documents.
///
/// Implementations stamp audit columns on every save; callers never set them.
#[async_trait]
pub trait GenericStore: Send + Sync {
    /// Load the oldest row with the given type.
    ///
    /// Returns `Ok(None)` if no row of that type exists.
    async fn find_by_type(&self, storage_type: StorageType) -> StorageResult<Option<StoredRow>>;

    /// Load all rows of a type, oldest first. Rows that cannot be read are
    /// left out.
    async fn find_all_by_type(&self, storage_type: StorageType) -> StorageResult<Vec<StoredRow>>;

    /// Load a row by identity.
    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<StoredRow>>;

    /// Insert or fully replace the row keyed by `id`.
    ///
    /// Creation columns are written only on insert; the last-modified pair
    /// moves on every call. Returns the row as persisted.
    async fn save(
        &self,
        id: Uuid,
        storage_type: StorageType,
        data: &serde_json::Value,
        actor: &Actor,
    ) -> StorageResult<StoredRow>;

    /// Replace the payload of row `id` only while its last-modified stamp is
    /// still `last_modified`.
    ///
    /// Returns `Ok(None)` if the row was saved since, is gone, or carries
    /// another type.
    async fn save_if_unmodified(
        &self,
        id: Uuid,
        storage_type: StorageType,
        data: &serde_json::Value,
        actor: &Actor,
        last_modified: DateTime<Utc>,
    ) -> StorageResult<Option<StoredRow>>;

    /// Delete a row. Returns `false` if it did not exist.
    async fn delete(&self, id: Uuid) -> StorageResult<bool>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> StorageResult<()>;
}
