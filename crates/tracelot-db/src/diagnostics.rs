//! Database operations for `skipped_orders` — per-order skip diagnostics.
//!
//! One row per vendor order that could not be reconciled, keyed by the
//! vendor order id. Repeated skips of the same order overwrite the reason
//! and detail blob rather than accumulating rows.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `skipped_orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SkippedOrderRow {
    pub id: i64,
    pub shipstation_order_id: i64,
    pub order_number: Option<String>,
    /// One of: `awaiting_shipment`, `fetch_error`, `db_upsert_failed`,
    /// `line_item_insert_failed`, `new_customer_record_upsert_failed`.
    pub reason: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upserts the diagnostic row for an order. Conflicts on the vendor order
/// id overwrite `reason` and `details` in place.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_skipped_order(
    pool: &PgPool,
    shipstation_order_id: i64,
    order_number: Option<&str>,
    reason: &str,
    details: &serde_json::Value,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO skipped_orders (shipstation_order_id, order_number, reason, details) \
         VALUES ($1, $2, $3, $4::jsonb) \
         ON CONFLICT (shipstation_order_id) DO UPDATE SET \
             order_number = EXCLUDED.order_number, \
             reason       = EXCLUDED.reason, \
             details      = EXCLUDED.details, \
             updated_at   = NOW()",
    )
    .bind(shipstation_order_id)
    .bind(order_number)
    .bind(reason)
    .bind(details)
    .execute(pool)
    .await?;

    Ok(())
}

/// Lists diagnostics, optionally filtered by reason, most recent first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_skipped_orders(
    pool: &PgPool,
    reason: Option<&str>,
    limit: i64,
) -> Result<Vec<SkippedOrderRow>, DbError> {
    let rows = sqlx::query_as::<_, SkippedOrderRow>(
        "SELECT id, shipstation_order_id, order_number, reason, details, created_at, updated_at \
         FROM skipped_orders \
         WHERE ($1::text IS NULL OR reason = $1) \
         ORDER BY updated_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(reason)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
