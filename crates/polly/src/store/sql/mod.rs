//! SQL-backed storage implementations.
//!
//! Uses an sqlx SQLite pool. The schema lives in `migrations/` and is applied
//! on connect, so a fresh database file is usable immediately.

mod generic;

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

use super::error::StorageResult;

pub use generic::SqlGenericStore;

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// Open a pool for `url`, creating the database file if needed, and migrate it.
pub async fn connect(url: &str, settings: &PoolSettings) -> StorageResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    info!(url = %redact(url), "Database ready");
    Ok(pool)
}

/// Open a private in-memory database.
///
/// Pinned to a single connection that never expires, since every SQLite
/// memory connection is its own database.
pub async fn connect_in_memory() -> StorageResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> StorageResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Strip query parameters, which may carry credentials, before logging a URL.
fn redact(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn connect_creates_database_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("polly.db");
        let url = format!("sqlite://{}", path.display());

        let pool = connect(&url, &PoolSettings::default()).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM generic_storage")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_in_memory().await.unwrap();
        migrate(&pool).await.unwrap();
    }

    #[test]
    fn redact_strips_query() {
        assert_eq!(redact("sqlite://x.db?mode=rwc"), "sqlite://x.db");
        assert_eq!(redact("sqlite::memory:"), "sqlite::memory:");
    }
}
