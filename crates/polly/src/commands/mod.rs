//! CLI command implementations.

pub mod serve;
pub mod unlock;

use std::net::IpAddr;

use anyhow::Result;
use sqlx::SqlitePool;

use polly::config::{self, Config};
use polly::store::sql;

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub database_url: Option<String>,
}

/// Load the config file and apply CLI overrides.
pub async fn load_config(config_path: &str, overrides: Overrides) -> Result<Config> {
    let mut config = Config::load(config_path).await?;

    if let Some(host) = overrides.host {
        config.server.host = host.to_string();
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(url) = overrides.database_url {
        config.database.url = url;
    }
    Ok(config)
}

/// Open the configured database and apply migrations.
pub async fn open_database(database: &config::DatabaseConfig) -> Result<SqlitePool> {
    let pool = if database.is_in_memory() {
        sql::connect_in_memory().await?
    } else {
        sql::connect(&database.url, &database.pool_settings()).await?
    };
    Ok(pool)
}
