//! Tracking of documents bound for the search index.
//!
//! Callers submit documents and request removals here. Nothing talks to the
//! index directly: the sync job picks up `PENDING` and `DELETED` records on
//! its next tick.

use tracing::info;
use uuid::Uuid;

use super::error::{Result, SearchError};
use crate::storage::{Actor, IndexDocument, IndexStatus, StorageRecord, StorageService, StorageType};
use crate::validation::ValidationErrors;

#[derive(Clone)]
pub struct IndexDocuments {
    storage: StorageService,
}

impl IndexDocuments {
    pub fn new(storage: StorageService) -> Self {
        Self { storage }
    }

    /// Queue a document for indexing.
    pub async fn submit(
        &self,
        actor: &Actor,
        index: &str,
        document_id: &str,
        document: serde_json::Value,
    ) -> Result<StorageRecord> {
        let index = index.trim();
        let document_id = document_id.trim();

        let mut errors = ValidationErrors::new();
        errors.check(!index.is_empty(), "index", "is required");
        errors.check(
            !index.contains('/') && !index.starts_with('_'),
            "index",
            "is not a valid index name",
        );
        errors.check(!document_id.is_empty(), "documentId", "is required");
        errors.check(!document_id.contains('/'), "documentId", "must not contain '/'");
        errors.check(document.is_object(), "document", "must be a JSON object");
        errors.into_result().map_err(SearchError::Invalid)?;

        let record = self
            .storage
            .save(
                actor,
                IndexDocument {
                    index: index.to_string(),
                    document_id: document_id.to_string(),
                    document,
                    status: IndexStatus::Pending,
                    indexed_at: None,
                },
            )
            .await?;
        info!(record_id = %record.id(), index, document_id, "Index document submitted");
        Ok(record)
    }

    pub async fn get(&self, id: Uuid) -> Result<StorageRecord> {
        Ok(self.storage.get_record(StorageType::IndexDocument, id).await?)
    }

    /// Flag a document for removal from the index.
    pub async fn mark_deleted(&self, actor: &Actor, id: Uuid) -> Result<StorageRecord> {
        let mut record = self.get(id).await?;
        let mut document: IndexDocument = record.data()?;
        if document.status == IndexStatus::Deleted {
            return Ok(record);
        }

        document.status = IndexStatus::Deleted;
        record.set_data(document);
        let record = self.storage.save_record(actor, record).await?;
        info!(record_id = %id, actor = %actor, "Index document marked for removal");
        Ok(record)
    }
}
