//! Connection pool lifecycle.
//!
//! The pool is created once at startup, handed to the stores by value, and
//! closed explicitly on shutdown. Nothing reaches it through global state.

use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::{info, instrument};

use crate::store::StoreError;
use crate::store::postgres::map_sqlx_error;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DbConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 20,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

#[instrument(skip(config), fields(max_connections = config.max_connections), err)]
pub async fn connect(config: &DbConfig) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;
    info!("database pool ready");
    Ok(pool)
}

/// Wait for checked-out connections to return, then close the pool.
pub async fn close(pool: &PgPool) {
    pool.close().await;
    info!("database pool closed");
}
