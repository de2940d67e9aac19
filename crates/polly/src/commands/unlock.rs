//! `polly unlock-app-state`: clear a stuck application state lock offline.

use std::sync::Arc;

use anyhow::Result;

use polly::storage::{Actor, StorageService};
use polly::store::sql::SqlGenericStore;

use super::{Overrides, load_config, open_database};

pub async fn run(
    config_path: &str,
    database_url: Option<String>,
    actor: Option<String>,
) -> Result<()> {
    let overrides = Overrides {
        database_url,
        ..Overrides::default()
    };
    let config = load_config(config_path, overrides).await?;
    if config.database.is_in_memory() {
        anyhow::bail!("an in-memory database has no lock to clear");
    }

    let pool = open_database(&config.database).await?;
    let storage = StorageService::new(Arc::new(SqlGenericStore::new(pool.clone())));
    let actor = actor.map(Actor::new).unwrap_or_else(Actor::system);

    let was_locked = storage.reset_app_state_lock(&actor).await?;
    pool.close().await;

    if was_locked {
        println!("Application state lock cleared");
    } else {
        println!("Application state was not locked");
    }
    Ok(())
}
