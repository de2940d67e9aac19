//! Typed access to generic storage.
//!
//! Hides serialization and find-or-create behind typed calls. There is no
//! caching: every call is a round-trip to the store.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};
use uuid::Uuid;

use super::record::{Actor, StorageRecord};
use super::types::{AppState, Payload, SingletonData, StorageData, StorageType};
use crate::store::{GenericStore, StorageError, StorageResult, StoredRow};

/// A stored row whose payload violates its type contract.
#[derive(Debug)]
pub struct UndecodableRecord {
    pub id: Uuid,
    pub error: StorageError,
}

/// One entry of a [`StorageService::scan_all`] pass.
pub type ScannedRecord = Result<StorageRecord, UndecodableRecord>;

/// Typed facade over a [`GenericStore`].
#[derive(Clone)]
pub struct StorageService {
    store: Arc<dyn GenericStore>,
}

impl StorageService {
    pub fn new(store: Arc<dyn GenericStore>) -> Self {
        Self { store }
    }

    // ------------------------------------------------------------------------
    // Singletons
    // ------------------------------------------------------------------------

    /// Load the singleton of type `T`, creating a default record on first access.
    ///
    /// Never fails for a missing row. Fails with a not-found class error when
    /// the stored payload does not decode as `T`.
    pub async fn get_singleton<T: SingletonData>(&self, actor: &Actor) -> StorageResult<T> {
        self.singleton_record::<T>(actor).await?.data()
    }

    /// Load (or create) the record backing the singleton of type `T`.
    ///
    /// Concurrent first access may create more than one row; the oldest wins.
    pub async fn singleton_record<T: SingletonData>(
        &self,
        actor: &Actor,
    ) -> StorageResult<StorageRecord> {
        if let Some(row) = self.store.find_by_type(T::TYPE).await? {
            return decode(row);
        }

        debug!(storage_type = %T::TYPE, "Creating singleton record");
        self.save(actor, T::default()).await
    }

    /// Read-modify-write a singleton, returning the persisted value.
    pub async fn update_singleton<T, F>(&self, actor: &Actor, update: F) -> StorageResult<T>
    where
        T: SingletonData,
        F: FnOnce(&mut T),
    {
        let mut record = self.singleton_record::<T>(actor).await?;
        let mut data: T = record.data()?;
        update(&mut data);
        record.set_data(data);
        self.save_record(actor, record).await?.data()
    }

    // ------------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------------

    /// Store `data` as a new record with a fresh identity.
    pub async fn save<T: StorageData>(
        &self,
        actor: &Actor,
        data: T,
    ) -> StorageResult<StorageRecord> {
        self.save_record(actor, StorageRecord::new(data.into_payload()))
            .await
    }

    /// Persist a record verbatim, replacing any row with the same identity.
    pub async fn save_record(
        &self,
        actor: &Actor,
        record: StorageRecord,
    ) -> StorageResult<StorageRecord> {
        let data = encode(&record)?;
        let row = self
            .store
            .save(record.id(), record.storage_type(), &data, actor)
            .await?;
        decode(row)
    }

    /// Persist `record` only if nobody saved it since it was read.
    ///
    /// Returns `Ok(None)` when the stored row changed or disappeared. A record
    /// that was never persisted is saved unconditionally.
    pub async fn save_record_if_unmodified(
        &self,
        actor: &Actor,
        record: StorageRecord,
    ) -> StorageResult<Option<StorageRecord>> {
        let Some(last_modified) = record.audit().map(|audit| audit.last_modified_date) else {
            return self.save_record(actor, record).await.map(Some);
        };
        let data = encode(&record)?;
        self.store
            .save_if_unmodified(record.id(), record.storage_type(), &data, actor, last_modified)
            .await?
            .map(decode)
            .transpose()
    }

    /// Fetch the typed payload of record `id`.
    pub async fn get<T: StorageData>(&self, id: Uuid) -> StorageResult<T> {
        self.get_record(T::TYPE, id).await?.data()
    }

    /// Fetch record `id`, which must be of `storage_type`.
    pub async fn get_record(
        &self,
        storage_type: StorageType,
        id: Uuid,
    ) -> StorageResult<StorageRecord> {
        match self.store.find_by_id(id).await? {
            Some(row) if row.storage_type == storage_type => decode(row),
            _ => Err(StorageError::not_found(entity_name(storage_type), id.to_string())),
        }
    }

    /// All records of type `T`, oldest first.
    pub async fn get_all<T: StorageData>(&self) -> StorageResult<Vec<StorageRecord>> {
        self.get_all_of(T::TYPE).await
    }

    /// All records carrying `storage_type`, oldest first.
    ///
    /// Records whose payload does not decode are logged and left out.
    pub async fn get_all_of(
        &self,
        storage_type: StorageType,
    ) -> StorageResult<Vec<StorageRecord>> {
        let records = self
            .scan_all_of(storage_type)
            .await?
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(record) => Some(record),
                Err(bad) => {
                    warn!(record_id = %bad.id, error = %bad.error, "Skipping undecodable record");
                    None
                }
            })
            .collect();
        Ok(records)
    }

    /// All records of type `T`, oldest first, each decoded on its own.
    pub async fn scan_all<T: StorageData>(&self) -> StorageResult<Vec<ScannedRecord>> {
        self.scan_all_of(T::TYPE).await
    }

    /// Like [`get_all_of`](Self::get_all_of), but hands back the records that
    /// fail to decode so queue consumers can drop them.
    pub async fn scan_all_of(
        &self,
        storage_type: StorageType,
    ) -> StorageResult<Vec<ScannedRecord>> {
        let rows = self.store.find_all_by_type(storage_type).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id;
                decode(row).map_err(|error| UndecodableRecord { id, error })
            })
            .collect())
    }

    pub async fn delete(&self, id: Uuid) -> StorageResult<()> {
        if self.store.delete(id).await? {
            Ok(())
        } else {
            Err(StorageError::not_found("storage record", id.to_string()))
        }
    }

    pub async fn ping(&self) -> StorageResult<()> {
        self.store.ping().await
    }

    // ------------------------------------------------------------------------
    // Application State
    // ------------------------------------------------------------------------

    /// Run `f` against the application state under its in-payload lock flag.
    ///
    /// Returns `Ok(None)` without calling `f` or writing anything when the
    /// flag is already set. Otherwise persists `locked = true`, runs `f`,
    /// and persists the state again with `locked = false`.
    ///
    /// The flag is advisory: a crash between the two writes leaves it set
    /// until cleared with [`reset_app_state_lock`](Self::reset_app_state_lock).
    pub async fn using_app_state<R, F>(&self, actor: &Actor, f: F) -> StorageResult<Option<R>>
    where
        F: for<'s> FnOnce(&'s mut AppState) -> BoxFuture<'s, R>,
    {
        let mut record = self.singleton_record::<AppState>(actor).await?;
        let mut state: AppState = record.data()?;
        if state.locked {
            debug!("Application state is locked, skipping");
            return Ok(None);
        }

        state.locked = true;
        record.set_data(state.clone());
        let mut record = self.save_record(actor, record).await?;

        let result = f(&mut state).await;

        state.locked = false;
        record.set_data(state);
        if let Err(e) = self.save_record(actor, record).await {
            warn!(error = %e, "Failed to release application state lock");
            return Err(e);
        }

        Ok(Some(result))
    }

    /// Clear a stuck application state lock. Returns whether it was set.
    pub async fn reset_app_state_lock(&self, actor: &Actor) -> StorageResult<bool> {
        let mut was_locked = false;
        self.update_singleton::<AppState, _>(actor, |state| {
            was_locked = state.locked;
            state.locked = false;
        })
        .await?;

        if was_locked {
            warn!(actor = %actor, "Application state lock reset");
        }
        Ok(was_locked)
    }
}

/// Map a raw row onto its typed payload.
fn encode(record: &StorageRecord) -> StorageResult<serde_json::Value> {
    record
        .payload()
        .encode()
        .map_err(|e| StorageError::serialization(e.to_string()))
}

fn decode(row: StoredRow) -> StorageResult<StorageRecord> {
    let payload = Payload::decode(row.storage_type, row.data)
        .map_err(|e| StorageError::invalid_payload(row.storage_type, row.id, e.to_string()))?;
    Ok(StorageRecord::from_parts(row.id, payload, row.audit))
}

fn entity_name(storage_type: StorageType) -> &'static str {
    match storage_type {
        StorageType::Settings => "settings",
        StorageType::AppState => "app state",
        StorageType::MailTask => "mail task",
        StorageType::IndexDocument => "index document",
    }
}
