//! Database bootstrap shared by the booking and payment stores.

use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::retry::{RetryPolicy, retry_with_backoff};

/// Errors raised by a durable store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The store refused the operation (used by in-memory stores to inject faults).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back to a domain value.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// The current time at the microsecond precision `TIMESTAMPTZ` keeps.
///
/// Every stored timestamp comes from here, so a value handed to a client
/// equals the one read back later.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Opens a Postgres pool, retrying with backoff until the database accepts connections.
#[tracing::instrument(skip(database_url, policy))]
pub async fn connect_with_retry(
    database_url: &str,
    max_connections: u32,
    policy: &RetryPolicy,
) -> Result<PgPool> {
    let pool = retry_with_backoff(policy, "database_connect", || {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
    })
    .await?;

    tracing::info!(max_connections, "database pool ready");
    Ok(pool)
}
