//! The destructive archive-and-rebuild operation.
//!
//! Copies every sync-sourced ledger row into timestamped archive tables,
//! deletes the live sync-sourced rows, and re-runs the full pipeline from a
//! fixed historical start date with a very high order cap. The
//! archive-then-delete ordering is load-bearing: any archival failure
//! propagates and aborts the operation before a single live row is deleted.

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;

use crate::engine::{SyncEngine, SyncOptions, SyncOutcome};
use crate::error::SyncError;

/// Historical window start for the full rebuild.
pub const REBUILD_START_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2019, 1, 1) {
    Some(date) => date,
    None => panic!("valid rebuild start date"),
};

/// Order cap high enough to never stop a rebuild early.
const REBUILD_MAX_ORDERS: u32 = 1_000_000;

/// Archives the live sync rows, deletes them, and re-syncs from
/// [`REBUILD_START_DATE`].
///
/// `options` supplies the throttle and lot-log path; the window and order
/// cap are overridden for the rebuild.
///
/// # Errors
///
/// Returns [`SyncError::Db`] if any archival statement fails — in which
/// case nothing has been deleted — or if the subsequent delete fails, and
/// propagates any error from the re-sync itself.
pub async fn archive_and_rebuild(
    pool: &PgPool,
    engine: &SyncEngine<'_>,
    options: &SyncOptions,
) -> Result<SyncOutcome, SyncError> {
    let suffix = Utc::now().format("%Y%m%d%H%M%S").to_string();

    let archived = tracelot_db::archive_sync_rows(pool, &suffix).await?;
    tracing::info!(
        suffix,
        headers = archived.headers,
        records = archived.records,
        summaries = archived.summaries,
        "archived live sync rows"
    );

    let deleted = tracelot_db::delete_sync_rows(pool).await?;
    tracing::info!(
        headers = deleted.headers,
        records = deleted.records,
        summaries = deleted.summaries,
        "deleted live sync rows; starting full re-sync"
    );

    let rebuild_options = SyncOptions {
        start_date: Some(REBUILD_START_DATE),
        max_orders: REBUILD_MAX_ORDERS,
        ..options.clone()
    };
    engine.run(&rebuild_options).await
}
