//! Connection pool and schema migrations.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::config::DatabaseConfig;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database connection failed: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("database did not answer within {0:?}")]
    PingTimeout(Duration),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Build the pool and check the database answers within the ping timeout.
pub async fn connect(cfg: &DatabaseConfig) -> Result<PgPool, DbError> {
    let timeout = Duration::from_secs(cfg.ping_timeout_seconds);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .min_connections(cfg.min_connections)
        .acquire_timeout(timeout)
        .connect_lazy(&cfg.url)?;

    ping(&pool, timeout).await?;
    tracing::info!(
        max_connections = cfg.max_connections,
        min_connections = cfg.min_connections,
        "database connection established"
    );
    Ok(pool)
}

pub async fn ping(pool: &PgPool, timeout: Duration) -> Result<(), DbError> {
    tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(pool))
        .await
        .map_err(|_| DbError::PingTimeout(timeout))??;
    Ok(())
}

/// Apply the embedded migrations in `crates/infra/migrations`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("database migrations completed");
    Ok(())
}
