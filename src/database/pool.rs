//! Postgres connection pool module.

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use crate::config::{Configuration, DatabaseConfig};
use crate::lifecycle::{Hook, Lifecycle};
use crate::module::{Inputs, Module, Outputs};
use crate::BoxError;

pub const MODULE_NAME: &str = "database-module";

pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.name)
}

pub fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
}

/// Open the pool and verify one connection.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    pool_options(config).connect_with(connect_options(config)).await
}

/// Close the pool, waiting at most `within` for checked-out connections.
/// Returns `false` when connections were abandoned.
pub async fn close(pool: &PgPool, within: Duration) -> bool {
    match tokio::time::timeout(within, pool.close()).await {
        Ok(()) => {
            tracing::info!("Database pool closed");
            true
        }
        Err(_) => {
            tracing::warn!(
                in_use = pool.size().saturating_sub(pool.num_idle() as u32),
                "Database pool close timed out, abandoning checked-out connections"
            );
            false
        }
    }
}

/// Provides a connected [`PgPool`]. The only hook closes it on stop.
pub fn module() -> Module {
    Module::new(MODULE_NAME, construct)
        .requires::<Configuration>()
        .provides::<PgPool>()
}

async fn construct(inputs: Inputs, lifecycle: Lifecycle) -> Result<Outputs, BoxError> {
    let config: DatabaseConfig = inputs.get::<Configuration>()?.section()?;

    let pool = connect(&config).await.inspect_err(|e| {
        tracing::error!(host = %config.host, port = config.port, database = %config.name, error = %e, "failed to connect to database");
    })?;
    tracing::info!(
        host = %config.host,
        database = %config.name,
        max_connections = config.max_connections,
        "Database pool connected"
    );

    let closing = pool.clone();
    lifecycle.append(Hook::new().on_stop(move |ctx| async move {
        close(&closing, ctx.remaining() / 2).await;
        Ok::<(), BoxError>(())
    }));

    Ok(Outputs::new().with(pool))
}
