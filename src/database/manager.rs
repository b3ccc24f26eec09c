use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Closed set of storage outcomes the rest of the crate matches on
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conditional write matched no rows")]
    EditConflict,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error("storage operation exceeded its deadline")]
    Timeout,

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Open the pool and verify connectivity within the configured connect timeout
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    let dsn = config
        .dsn
        .as_deref()
        .ok_or_else(|| StoreError::Unavailable("no database DSN configured".into()))?;

    let connect_timeout = Duration::from_secs(config.connect_timeout_secs);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_open_conns)
        .idle_timeout(Duration::from_secs(config.max_idle_time_secs))
        .acquire_timeout(connect_timeout)
        .connect_lazy(dsn)?;

    ping(&pool, connect_timeout).await?;
    info!(
        max_connections = config.max_open_conns,
        "database connection pool established"
    );
    Ok(pool)
}

/// `SELECT 1` bounded by `limit`
pub async fn ping(pool: &PgPool, limit: Duration) -> Result<(), StoreError> {
    tokio::time::timeout(limit, sqlx::query("SELECT 1").execute(pool))
        .await
        .map_err(|_| StoreError::Timeout)??;
    Ok(())
}

/// Apply the embedded migrations under `migrations/`
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))?;
    info!("database migrations applied");
    Ok(())
}
