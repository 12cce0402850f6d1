//! Database module: legacy source, target transaction and connection setup.
//!
//! - `model`: typed legacy rows read from MySQL.
//! - `source`: the `LegacySource` trait and its MySQL implementation.
//! - `target`: `PgTarget`, the PostgreSQL transaction every store writes to.
//!
//! Pools are created here and handed to callers; nothing in this module
//! holds a connection of its own.

pub mod model;
pub mod source;
pub mod target;

use anyhow::{Context, Result};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{MySqlPool, PgPool};
use tracing::{info, instrument};

use crate::config::{MySqlConfig, PostgresConfig};

pub use source::{LegacySource, MySqlSource};
pub use target::PgTarget;

#[instrument(skip_all)]
pub async fn init_postgres(cfg: &PostgresConfig, max_connections: u32) -> Result<PgPool> {
    let options = PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .database(&cfg.database)
        .username(&cfg.user)
        .password(&cfg.password);
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to postgres at {}:{}", cfg.host, cfg.port))?;
    info!(host = %cfg.host, db = %cfg.database, "connected to target postgres");
    Ok(pool)
}

#[instrument(skip_all)]
pub async fn init_mysql(cfg: &MySqlConfig, max_connections: u32) -> Result<MySqlPool> {
    let options = MySqlConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .database(&cfg.database)
        .username(&cfg.user)
        .password(&cfg.password)
        .charset("utf8mb4");
    let pool = MySqlPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to mysql at {}:{}", cfg.host, cfg.port))?;
    info!(host = %cfg.host, db = %cfg.database, "connected to legacy mysql");
    Ok(pool)
}

/// Apply the bundled target schema. Only needed on an empty target.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to apply target schema")?;
    Ok(())
}
