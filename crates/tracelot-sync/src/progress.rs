//! Push-style progress reporting and cooperative cancellation.
//!
//! The engine reports counters at many granular points (page start, page
//! fetched, every 5th order, every shipment fetch, every synced shipment,
//! every 25th skip) through a [`ProgressSink`], and polls a [`CancelProbe`]
//! before every page and before every shipment. The Postgres-backed
//! implementations persist to the singleton `sync_status` row, whose
//! `updated_at` doubles as the heartbeat for the staleness sweep — the
//! sweep itself lives in the status layer, not here.

use async_trait::async_trait;
use sqlx::PgPool;

/// A progress snapshot with the fixed keyword contract the admin surface
/// reads back: synced, skipped, current page, status, message.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub synced: i32,
    pub skipped: i32,
    pub current_page: i32,
    pub status: &'static str,
    pub message: String,
}

/// Receives progress snapshots. Implementations decide how to surface them;
/// reporting is best-effort and must never fail the run.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, update: &ProgressUpdate);
}

/// Polled cancellation check. `true` stops the run at the next page or
/// shipment boundary; in-flight HTTP calls and sleeps are never interrupted.
#[async_trait]
pub trait CancelProbe: Send + Sync {
    async fn is_canceled(&self) -> bool;
}

/// Persists progress to the `sync_status` row.
pub struct PgProgressSink {
    pool: PgPool,
}

impl PgProgressSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressSink for PgProgressSink {
    async fn report(&self, update: &ProgressUpdate) {
        if let Err(e) = tracelot_db::update_sync_progress(
            &self.pool,
            update.synced,
            update.skipped,
            update.current_page,
            update.status,
            &update.message,
        )
        .await
        {
            tracing::warn!(error = %e, "failed to persist progress update");
        }
    }
}

/// Reads the cancellation flag from the `sync_status` row. A read failure
/// counts as "not canceled" — cancellation must never be triggered by a
/// transient status-read error.
pub struct PgCancelProbe {
    pool: PgPool,
}

impl PgCancelProbe {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CancelProbe for PgCancelProbe {
    async fn is_canceled(&self) -> bool {
        match tracelot_db::is_cancel_requested(&self.pool).await {
            Ok(flagged) => flagged,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read cancel flag");
                false
            }
        }
    }
}

/// A probe that never cancels; the rebuild path's unattended re-sync must
/// run to completion.
pub struct NeverCancel;

#[async_trait]
impl CancelProbe for NeverCancel {
    async fn is_canceled(&self) -> bool {
        false
    }
}
