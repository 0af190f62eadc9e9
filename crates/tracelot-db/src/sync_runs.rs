//! Database operations for `sync_runs` — the append-only run history.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `sync_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncRunRow {
    pub id: i64,
    pub synced: i32,
    pub skipped: i32,
    pub orders_seen: i32,
    pub shipments_seen: i32,
    pub duration_secs: i32,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Counters and summary for a completed sync invocation.
#[derive(Debug, Clone)]
pub struct NewSyncRun {
    pub synced: i32,
    pub skipped: i32,
    pub orders_seen: i32,
    pub shipments_seen: i32,
    pub duration_secs: i32,
    pub message: String,
}

/// Appends one row per completed sync invocation.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_sync_run(pool: &PgPool, run: &NewSyncRun) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO sync_runs (synced, skipped, orders_seen, shipments_seen, duration_secs, message) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id",
    )
    .bind(run.synced)
    .bind(run.skipped)
    .bind(run.orders_seen)
    .bind(run.shipments_seen)
    .bind(run.duration_secs)
    .bind(&run.message)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sync_runs(pool: &PgPool, limit: i64) -> Result<Vec<SyncRunRow>, DbError> {
    let rows = sqlx::query_as::<_, SyncRunRow>(
        "SELECT id, synced, skipped, orders_seen, shipments_seen, duration_secs, message, created_at \
         FROM sync_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
