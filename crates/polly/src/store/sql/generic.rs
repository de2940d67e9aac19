//! SQLite implementation of `GenericStore`.
//!
//! Stores every document in the `generic_storage` table, payload as JSON text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::error;
use uuid::Uuid;

use crate::storage::{Actor, AuditMetadata, StorageType};
use crate::store::error::{StorageError, StorageResult};
use crate::store::generic::{GenericStore, StoredRow};

const COLUMNS: &str =
    "id, type, data, created_by, created_date, last_modified_by, last_modified_date";

/// SQL-backed implementation of `GenericStore`.
#[derive(Debug, Clone)]
pub struct SqlGenericStore {
    pool: SqlitePool,
}

impl SqlGenericStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Row as read from the table.
#[derive(Debug, sqlx::FromRow)]
struct GenericRow {
    id: String,
    #[sqlx(rename = "type")]
    storage_type: String,
    data: String,
    created_by: String,
    created_date: DateTime<Utc>,
    last_modified_by: String,
    last_modified_date: DateTime<Utc>,
}

impl TryFrom<GenericRow> for StoredRow {
    type Error = StorageError;

    fn try_from(row: GenericRow) -> Result<Self, Self::Error> {
        let storage_type = row
            .storage_type
            .parse::<StorageType>()
            .map_err(|_| StorageError::UnknownType {
                id: row.id.clone(),
                tag: row.storage_type.clone(),
            })?;
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| StorageError::serialization(format!("bad id '{}': {e}", row.id)))?;
        let data = serde_json::from_str(&row.data)
            .map_err(|e| StorageError::invalid_payload(storage_type, id, e.to_string()))?;

        Ok(StoredRow {
            id,
            storage_type,
            data,
            audit: AuditMetadata {
                created_by: row.created_by,
                created_date: row.created_date,
                last_modified_by: row.last_modified_by,
                last_modified_date: row.last_modified_date,
            },
        })
    }
}

#[async_trait]
impl GenericStore for SqlGenericStore {
    async fn find_by_type(&self, storage_type: StorageType) -> StorageResult<Option<StoredRow>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM generic_storage WHERE type = ? \
             ORDER BY created_date, id LIMIT 1"
        );
        let row = sqlx::query_as::<_, GenericRow>(&sql)
            .bind(storage_type.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(StoredRow::try_from).transpose()
    }

    async fn find_all_by_type(&self, storage_type: StorageType) -> StorageResult<Vec<StoredRow>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM generic_storage WHERE type = ? ORDER BY created_date, id"
        );
        let rows = sqlx::query_as::<_, GenericRow>(&sql)
            .bind(storage_type.as_str())
            .fetch_all(&self.pool)
            .await?;

        let rows = rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id.clone();
                StoredRow::try_from(row)
                    .inspect_err(|e| {
                        error!(record_id = %id, error = %e, "Unreadable row skipped");
                    })
                    .ok()
            })
            .collect();
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<StoredRow>> {
        let sql = format!("SELECT {COLUMNS} FROM generic_storage WHERE id = ?");
        let row = sqlx::query_as::<_, GenericRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(StoredRow::try_from).transpose()
    }

    async fn save(
        &self,
        id: Uuid,
        storage_type: StorageType,
        data: &serde_json::Value,
        actor: &Actor,
    ) -> StorageResult<StoredRow> {
        let now = Utc::now();
        let data =
            serde_json::to_string(data).map_err(|e| StorageError::serialization(e.to_string()))?;

        // The type tag of an existing row is fixed: a save under another
        // tag updates nothing and returns no row.
        let sql = format!(
            "INSERT INTO generic_storage ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                 data = excluded.data, \
                 last_modified_by = excluded.last_modified_by, \
                 last_modified_date = excluded.last_modified_date \
             WHERE generic_storage.type = excluded.type \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, GenericRow>(&sql)
            .bind(id.to_string())
            .bind(storage_type.as_str())
            .bind(data)
            .bind(actor.as_str())
            .bind(now)
            .bind(actor.as_str())
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => StoredRow::try_from(row),
            None => Err(StorageError::TypeConflict { id, storage_type }),
        }
    }

    async fn save_if_unmodified(
        &self,
        id: Uuid,
        storage_type: StorageType,
        data: &serde_json::Value,
        actor: &Actor,
        last_modified: DateTime<Utc>,
    ) -> StorageResult<Option<StoredRow>> {
        let data =
            serde_json::to_string(data).map_err(|e| StorageError::serialization(e.to_string()))?;
        let sql = format!(
            "UPDATE generic_storage \
             SET data = ?, last_modified_by = ?, last_modified_date = ? \
             WHERE id = ? AND type = ? AND last_modified_date = ? \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, GenericRow>(&sql)
            .bind(data)
            .bind(actor.as_str())
            .bind(Utc::now())
            .bind(id.to_string())
            .bind(storage_type.as_str())
            .bind(last_modified)
            .fetch_optional(&self.pool)
            .await?;

        row.map(StoredRow::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM generic_storage WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
