//! Database operations for the singleton `sync_status` row.
//!
//! The row (id = 1, seeded by migration) is the externally-persisted
//! progress blob an admin surface polls, plus the cooperative cancellation
//! flag the engine checks at page and shipment boundaries. `updated_at`
//! doubles as the heartbeat consulted by the staleness sweep.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// The singleton row from the `sync_status` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncStatusRow {
    pub id: i32,
    pub synced: i32,
    pub skipped: i32,
    pub current_page: i32,
    /// One of: `idle`, `running`, `completed`, `error`, `stale`.
    pub status: String,
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub cancel_requested: bool,
}

const STATUS_COLUMNS: &str = "id, synced, skipped, current_page, status, message, started_at, \
     updated_at, error_message, cancel_requested";

/// Fetches the current status blob.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the seed row is missing, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_sync_status(pool: &PgPool) -> Result<SyncStatusRow, DbError> {
    let row = sqlx::query_as::<_, SyncStatusRow>(&format!(
        "SELECT {STATUS_COLUMNS} FROM sync_status WHERE id = 1",
    ))
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Claims the status row for a new run: resets counters, clears the cancel
/// flag, and flips the status to `running`.
///
/// Only one run may be active; the update is conditional on the status not
/// already being `running`, which is the single-run enforcement point.
///
/// # Errors
///
/// Returns [`DbError::SyncRunActive`] if a run is already marked running,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn begin_sync_status(pool: &PgPool, message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sync_status SET \
             synced = 0, skipped = 0, current_page = 0, \
             status = 'running', message = $1, \
             started_at = NOW(), updated_at = NOW(), \
             error_message = NULL, cancel_requested = FALSE \
         WHERE id = 1 AND status <> 'running'",
    )
    .bind(message)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::SyncRunActive);
    }

    Ok(())
}

/// Writes a progress heartbeat: counters, page, and status message.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_sync_progress(
    pool: &PgPool,
    synced: i32,
    skipped: i32,
    current_page: i32,
    status: &str,
    message: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE sync_status SET \
             synced = $1, skipped = $2, current_page = $3, \
             status = $4, message = $5, updated_at = NOW() \
         WHERE id = 1",
    )
    .bind(synced)
    .bind(skipped)
    .bind(current_page)
    .bind(status)
    .bind(message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Marks the run finished with a terminal status (`completed` or `error`)
/// and an optional error text.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn finish_sync_status(
    pool: &PgPool,
    status: &str,
    message: &str,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE sync_status SET \
             status = $1, message = $2, error_message = $3, \
             cancel_requested = FALSE, updated_at = NOW() \
         WHERE id = 1",
    )
    .bind(status)
    .bind(message)
    .bind(error_message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Requests cooperative cancellation of the running sync. Returns `true` if
/// a running sync was flagged, `false` if nothing was running.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn request_cancel(pool: &PgPool) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE sync_status SET cancel_requested = TRUE, updated_at = NOW() \
         WHERE id = 1 AND status = 'running'",
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Reads the cancellation flag.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn is_cancel_requested(pool: &PgPool) -> Result<bool, DbError> {
    let flagged: bool =
        sqlx::query_scalar::<_, bool>("SELECT cancel_requested FROM sync_status WHERE id = 1")
            .fetch_one(pool)
            .await?;

    Ok(flagged)
}

/// Reclassifies a `running` status with no recent heartbeat as `stale`, so
/// a crashed run does not wedge the admin surface forever. Returns `true`
/// if the row was reclassified.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_stale_if_quiet(pool: &PgPool, quiet_secs: i64) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE sync_status SET \
             status = 'stale', \
             message = 'run went quiet; reclassified by staleness sweep', \
             cancel_requested = FALSE, updated_at = NOW() \
         WHERE id = 1 AND status = 'running' \
           AND updated_at < NOW() - ($1 * interval '1 second')",
    )
    .bind(quiet_secs)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
