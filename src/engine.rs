use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::error::Result;
use crate::settings::DatabaseSettings;

/// Builds the shared connection pool. Connections are pinged before being handed out.
pub async fn create_pool(settings: &DatabaseSettings) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&settings.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout())
        .test_before_acquire(true)
        .connect_with(options)
        .await?;

    tracing::debug!(url = %settings.url, "database pool ready");

    Ok(pool)
}
