//! Leader-gated jobs keeping the search index in step with storage.
//!
//! Both jobs run inside `StorageService::using_app_state`, so a tick that
//! finds the application state locked does nothing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::error::{Result, SearchError};
use super::index::SearchIndex;
use crate::scheduler::{self, Job};
use crate::storage::{Actor, IndexDocument, IndexStatus, StorageService};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub indexed: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Pushes pending documents to the index and removes deleted ones.
pub struct IndexSyncJob {
    storage: StorageService,
    index: Arc<dyn SearchIndex>,
}

impl IndexSyncJob {
    pub fn new(storage: StorageService, index: Arc<dyn SearchIndex>) -> Self {
        Self { storage, index }
    }
}

#[async_trait]
impl Job for IndexSyncJob {
    fn name(&self) -> &'static str {
        "index-sync"
    }

    async fn run(&self) -> scheduler::Result<()> {
        let storage = self.storage.clone();
        let index = self.index.clone();

        let outcome = self
            .storage
            .using_app_state(&Actor::system(), move |state| {
                Box::pin(async move {
                    let report = sync_documents(&storage, index.as_ref()).await?;
                    state.last_index_sync = Some(Utc::now());
                    Ok::<_, SearchError>(report)
                })
            })
            .await?;

        match outcome {
            Some(result) => {
                let report = result?;
                if report != SyncReport::default() {
                    info!(
                        indexed = report.indexed,
                        removed = report.removed,
                        failed = report.failed,
                        "Index sync finished"
                    );
                }
            }
            None => debug!("Index sync skipped, application state locked"),
        }
        Ok(())
    }
}

/// One pass over the tracked documents.
///
/// A pushed document is only marked `INDEXED` if its record was not saved
/// again while the push was in flight. A removal requested meanwhile is left
/// for the next pass.
pub async fn sync_documents(
    storage: &StorageService,
    index: &dyn SearchIndex,
) -> Result<SyncReport> {
    let actor = Actor::system();
    let mut report = SyncReport::default();

    for mut record in storage.get_all::<IndexDocument>().await? {
        let doc: IndexDocument = record.data()?;
        match doc.status {
            IndexStatus::Pending => {
                if let Err(e) = index.put(&doc.index, &doc.document_id, &doc.document).await {
                    report.failed += 1;
                    warn!(
                        record_id = %record.id(),
                        error = %e,
                        "Indexing failed, retrying next tick"
                    );
                    continue;
                }
                report.indexed += 1;

                let id = record.id();
                let mut indexed = doc;
                indexed.status = IndexStatus::Indexed;
                indexed.indexed_at = Some(Utc::now());
                record.set_data(indexed);
                if storage.save_record_if_unmodified(&actor, record).await?.is_none() {
                    debug!(record_id = %id, "Document changed during push, left as is");
                }
            }
            IndexStatus::Deleted => {
                if let Err(e) = index.remove(&doc.index, &doc.document_id).await {
                    report.failed += 1;
                    warn!(
                        record_id = %record.id(),
                        error = %e,
                        "Index removal failed, retrying next tick"
                    );
                    continue;
                }
                match storage.delete(record.id()).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e.into()),
                }
                report.removed += 1;
            }
            IndexStatus::Indexed => {}
        }
    }

    Ok(report)
}

/// Drops bookkeeping records of documents indexed long ago.
pub struct StalePurgeJob {
    storage: StorageService,
    retention: chrono::Duration,
}

impl StalePurgeJob {
    pub fn new(storage: StorageService, retention: chrono::Duration) -> Self {
        Self { storage, retention }
    }
}

#[async_trait]
impl Job for StalePurgeJob {
    fn name(&self) -> &'static str {
        "stale-purge"
    }

    async fn run(&self) -> scheduler::Result<()> {
        let storage = self.storage.clone();
        let cutoff = purge_cutoff(Utc::now(), self.retention);

        let outcome = self
            .storage
            .using_app_state(&Actor::system(), move |state| {
                Box::pin(async move {
                    let purged = purge_indexed_before(&storage, cutoff).await?;
                    state.last_stale_purge = Some(Utc::now());
                    Ok::<_, SearchError>(purged)
                })
            })
            .await?;

        match outcome {
            Some(result) => {
                let purged = result?;
                if purged > 0 {
                    info!(purged, %cutoff, "Stale index documents purged");
                }
            }
            None => debug!("Stale purge skipped, application state locked"),
        }
        Ok(())
    }
}

/// `now - retention`, clamped to the earliest representable instant.
fn purge_cutoff(now: DateTime<Utc>, retention: chrono::Duration) -> DateTime<Utc> {
    now.checked_sub_signed(retention).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Delete `INDEXED` records last modified before `cutoff`. Returns how many went.
pub async fn purge_indexed_before(
    storage: &StorageService,
    cutoff: DateTime<Utc>,
) -> Result<usize> {
    let mut purged = 0;
    for record in storage.get_all::<IndexDocument>().await? {
        let doc: IndexDocument = record.data()?;
        let stale = record
            .audit()
            .is_some_and(|audit| audit.last_modified_date < cutoff);
        if doc.status != IndexStatus::Indexed || !stale {
            continue;
        }
        match storage.delete(record.id()).await {
            Ok(()) => purged += 1,
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use serde_json::json;

    use uuid::Uuid;

    use crate::search::IndexDocuments;
    use crate::storage::{AppState, StorageType};
    use crate::store::GenericStore;
    use crate::store::sql::{SqlGenericStore, connect_in_memory};

    /// Records calls; fails for document ids starting with "fail".
    #[derive(Default)]
    struct FakeIndex {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SearchIndex for FakeIndex {
        async fn put(&self, index: &str, id: &str, _document: &serde_json::Value) -> Result<()> {
            if id.starts_with("fail") {
                return Err(SearchError::Rejected {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            self.calls.lock().unwrap().push(format!("put {index}/{id}"));
            Ok(())
        }

        async fn remove(&self, index: &str, id: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("remove {index}/{id}"));
            Ok(())
        }
    }

    /// Requests removal of one record while its push is in flight.
    struct RacingIndex {
        documents: IndexDocuments,
        target: Uuid,
    }

    #[async_trait]
    impl SearchIndex for RacingIndex {
        async fn put(&self, _index: &str, _id: &str, _document: &serde_json::Value) -> Result<()> {
            self.documents
                .mark_deleted(&Actor::new("editor"), self.target)
                .await?;
            Ok(())
        }

        async fn remove(&self, _index: &str, _id: &str) -> Result<()> {
            Ok(())
        }
    }

    async fn create_storage() -> StorageService {
        create_storage_with_store().await.0
    }

    async fn create_storage_with_store() -> (StorageService, Arc<SqlGenericStore>) {
        let store = Arc::new(SqlGenericStore::new(connect_in_memory().await.unwrap()));
        (StorageService::new(store.clone()), store)
    }

    fn doc(id: &str, status: IndexStatus) -> IndexDocument {
        IndexDocument {
            index: "catalog".into(),
            document_id: id.into(),
            document: json!({"id": id}),
            status,
            indexed_at: None,
        }
    }

    #[tokio::test]
    async fn sync_pushes_pending_and_removes_deleted() {
        let storage = create_storage().await;
        let actor = Actor::system();
        let pending = storage.save(&actor, doc("a", IndexStatus::Pending)).await.unwrap();
        let deleted = storage.save(&actor, doc("b", IndexStatus::Deleted)).await.unwrap();
        let index = Arc::new(FakeIndex::default());

        let job = IndexSyncJob::new(storage.clone(), index.clone());
        job.run().await.unwrap();

        assert_eq!(
            *index.calls.lock().unwrap(),
            vec!["put catalog/a", "remove catalog/b"]
        );
        let synced: IndexDocument = storage.get(pending.id()).await.unwrap();
        assert_eq!(synced.status, IndexStatus::Indexed);
        assert!(synced.indexed_at.is_some());
        assert!(storage.get::<IndexDocument>(deleted.id()).await.is_err());

        let state: AppState = storage.get_singleton(&actor).await.unwrap();
        assert!(state.last_index_sync.is_some());
        assert!(!state.locked);
    }

    #[tokio::test]
    async fn failed_push_leaves_document_pending() {
        let storage = create_storage().await;
        let actor = Actor::system();
        let failing = storage.save(&actor, doc("fail-1", IndexStatus::Pending)).await.unwrap();
        storage.save(&actor, doc("ok", IndexStatus::Pending)).await.unwrap();

        let report = sync_documents(&storage, &FakeIndex::default()).await.unwrap();

        assert_eq!(
            report,
            SyncReport {
                indexed: 1,
                removed: 0,
                failed: 1
            }
        );
        let untouched: IndexDocument = storage.get(failing.id()).await.unwrap();
        assert_eq!(untouched.status, IndexStatus::Pending);
    }

    #[tokio::test]
    async fn removal_requested_during_push_survives_sync() {
        let storage = create_storage().await;
        let record = storage
            .save(&Actor::system(), doc("a", IndexStatus::Pending))
            .await
            .unwrap();
        let index = RacingIndex {
            documents: IndexDocuments::new(storage.clone()),
            target: record.id(),
        };

        sync_documents(&storage, &index).await.unwrap();
        let after: IndexDocument = storage.get(record.id()).await.unwrap();
        assert_eq!(after.status, IndexStatus::Deleted);
        assert!(after.indexed_at.is_none());

        let report = sync_documents(&storage, &index).await.unwrap();
        assert_eq!(report.removed, 1);
        assert!(storage.get::<IndexDocument>(record.id()).await.is_err());
    }

    #[tokio::test]
    async fn undecodable_record_does_not_block_sync() {
        let (storage, store) = create_storage_with_store().await;
        let actor = Actor::system();
        store
            .save(
                Uuid::new_v4(),
                StorageType::IndexDocument,
                &json!({"index": "catalog", "status": "SOMETIMES"}),
                &actor,
            )
            .await
            .unwrap();
        let good = storage.save(&actor, doc("a", IndexStatus::Pending)).await.unwrap();
        let index = FakeIndex::default();

        let report = sync_documents(&storage, &index).await.unwrap();

        assert_eq!(report.indexed, 1);
        assert_eq!(*index.calls.lock().unwrap(), vec!["put catalog/a"]);
        let synced: IndexDocument = storage.get(good.id()).await.unwrap();
        assert_eq!(synced.status, IndexStatus::Indexed);
        let later = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(purge_indexed_before(&storage, later).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn sync_does_nothing_while_app_state_locked() {
        let storage = create_storage().await;
        let actor = Actor::system();
        storage.save(&actor, doc("a", IndexStatus::Pending)).await.unwrap();
        storage
            .update_singleton::<AppState, _>(&actor, |s| s.locked = true)
            .await
            .unwrap();
        let index = Arc::new(FakeIndex::default());

        IndexSyncJob::new(storage.clone(), index.clone())
            .run()
            .await
            .unwrap();

        assert!(index.calls.lock().unwrap().is_empty());
        let state: AppState = storage.get_singleton(&actor).await.unwrap();
        assert!(state.locked);
        assert!(state.last_index_sync.is_none());
    }

    #[tokio::test]
    async fn purge_removes_only_indexed_records_before_cutoff() {
        let storage = create_storage().await;
        let actor = Actor::system();
        let indexed = storage.save(&actor, doc("a", IndexStatus::Indexed)).await.unwrap();
        let pending = storage.save(&actor, doc("b", IndexStatus::Pending)).await.unwrap();

        let none = purge_indexed_before(&storage, Utc::now() - chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(none, 0);

        let purged = purge_indexed_before(&storage, Utc::now() + chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(storage.get::<IndexDocument>(indexed.id()).await.is_err());
        assert!(storage.get::<IndexDocument>(pending.id()).await.is_ok());
    }

    #[test]
    fn purge_cutoff_clamps_huge_retention() {
        let now = Utc::now();
        let day = chrono::Duration::days(1);
        assert_eq!(purge_cutoff(now, day), now - day);

        let huge = chrono::Duration::days(i64::from(u32::MAX));
        assert_eq!(purge_cutoff(now, huge), DateTime::<Utc>::MIN_UTC);
    }

    #[tokio::test]
    async fn purge_job_tolerates_huge_retention() {
        let storage = create_storage().await;
        let actor = Actor::system();
        let kept = storage.save(&actor, doc("a", IndexStatus::Indexed)).await.unwrap();
        let retention = chrono::Duration::days(i64::from(u32::MAX));

        StalePurgeJob::new(storage.clone(), retention)
            .run()
            .await
            .unwrap();

        assert!(storage.get::<IndexDocument>(kept.id()).await.is_ok());
        let state: AppState = storage.get_singleton(&actor).await.unwrap();
        assert!(state.last_stale_purge.is_some());
    }

    #[tokio::test]
    async fn purge_job_records_last_run() {
        let storage = create_storage().await;
        let job = StalePurgeJob::new(storage.clone(), chrono::Duration::days(30));

        job.run().await.unwrap();

        let state: AppState = storage.get_singleton(&Actor::system()).await.unwrap();
        assert!(state.last_stale_purge.is_some());
        assert!(!state.locked);
    }
}
