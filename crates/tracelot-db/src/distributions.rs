//! Database operations for `distribution_headers` and `distribution_records`.
//!
//! The sync engine owns rows tagged `source = 'shipstation'` exclusively.
//! Rows from other subsystems (manual entry, CSV import) carry different
//! source markers and are never selected by the delete statements here.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::DbError;

/// Source marker on rows owned by the external-sync engine.
pub const SYNC_SOURCE: &str = "shipstation";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `distribution_headers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DistributionHeaderRow {
    pub id: i64,
    /// Human-readable `DIST-<year>-<seq>` number assigned by a server-side
    /// trigger on insert.
    pub distribution_number: Option<String>,
    pub order_number: String,
    pub ship_date: Option<NaiveDate>,
    pub tracking_number: Option<String>,
    /// Vendor shipment id; unique when present. Legacy rows predating the
    /// external sync lack one.
    pub shipstation_shipment_id: Option<i64>,
    pub rep_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting or backfilling a sync-owned header.
#[derive(Debug, Clone)]
pub struct NewDistributionHeader {
    pub order_number: String,
    pub ship_date: Option<NaiveDate>,
    pub tracking_number: Option<String>,
    pub shipstation_shipment_id: i64,
    pub rep_id: Option<i64>,
    pub customer_id: Option<i64>,
}

/// Fields for one denormalized distribution line record.
#[derive(Debug, Clone)]
pub struct NewDistributionRecord {
    pub header_id: i64,
    pub facility_name: Option<String>,
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub company_key: Option<String>,
    pub sku: String,
    pub lot: String,
    pub quantity: i32,
    pub distribution_date: Option<NaiveDate>,
    pub order_number: String,
    pub shipstation_shipment_id: i64,
}

// ---------------------------------------------------------------------------
// distribution_headers operations
// ---------------------------------------------------------------------------

const HEADER_COLUMNS: &str = "id, distribution_number, order_number, ship_date, tracking_number, \
     shipstation_shipment_id, rep_id, customer_id, source, created_at, updated_at";

/// Looks up a header by its vendor shipment id (exact match).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_header_by_shipment_id(
    pool: &PgPool,
    shipment_id: i64,
) -> Result<Option<DistributionHeaderRow>, DbError> {
    let row = sqlx::query_as::<_, DistributionHeaderRow>(&format!(
        "SELECT {HEADER_COLUMNS} FROM distribution_headers WHERE shipstation_shipment_id = $1",
    ))
    .bind(shipment_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Inserts a new sync-owned header and returns its internal id.
///
/// `distribution_number` is left NULL so the database trigger assigns the
/// next sequential number for the ship-date year.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including unique-violation
/// on `shipstation_shipment_id`).
pub async fn insert_sync_header(
    pool: &PgPool,
    header: &NewDistributionHeader,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO distribution_headers \
             (order_number, ship_date, tracking_number, shipstation_shipment_id, \
              rep_id, customer_id, source) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(&header.order_number)
    .bind(header.ship_date)
    .bind(&header.tracking_number)
    .bind(header.shipstation_shipment_id)
    .bind(header.rep_id)
    .bind(header.customer_id)
    .bind(SYNC_SOURCE)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Backfills an existing header on re-sync.
///
/// The order number follows the vendor; ship date, tracking number, rep, and
/// customer are filled only where currently NULL — a human-assigned rep or
/// customer is never overwritten.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_sync_header(
    pool: &PgPool,
    id: i64,
    header: &NewDistributionHeader,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE distribution_headers SET \
             order_number    = $1, \
             ship_date       = COALESCE(ship_date, $2), \
             tracking_number = COALESCE(tracking_number, $3), \
             rep_id          = COALESCE(rep_id, $4), \
             customer_id     = COALESCE(customer_id, $5), \
             updated_at      = NOW() \
         WHERE id = $6",
    )
    .bind(&header.order_number)
    .bind(header.ship_date)
    .bind(&header.tracking_number)
    .bind(header.rep_id)
    .bind(header.customer_id)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Deletes pre-sync legacy headers for an order number: rows that lack a
/// vendor shipment id, artifacts of the older per-order aggregation scheme.
/// Child records cascade. Returns the number of headers removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_legacy_headers_for_order(
    pool: &PgPool,
    order_number: &str,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "DELETE FROM distribution_headers \
         WHERE order_number = $1 \
           AND shipstation_shipment_id IS NULL \
           AND source = $2",
    )
    .bind(order_number)
    .bind(SYNC_SOURCE)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// distribution_records operations
// ---------------------------------------------------------------------------

/// Deletes the sync-owned line records under a header before reinsertion.
///
/// Only rows carrying the sync source marker are touched; records attached
/// by manual entry or CSV import survive re-sync untouched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_sync_records_for_header(pool: &PgPool, header_id: i64) -> Result<u64, DbError> {
    let result =
        sqlx::query("DELETE FROM distribution_records WHERE header_id = $1 AND source = $2")
            .bind(header_id)
            .bind(SYNC_SOURCE)
            .execute(pool)
            .await?;

    Ok(result.rows_affected())
}

/// Inserts one line record and returns its internal id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including the
/// `quantity > 0` check constraint).
pub async fn insert_sync_record(
    pool: &PgPool,
    record: &NewDistributionRecord,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO distribution_records \
             (header_id, facility_name, street1, street2, city, state, postal_code, \
              company_key, sku, lot, quantity, distribution_date, order_number, \
              shipstation_shipment_id, source) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         RETURNING id",
    )
    .bind(record.header_id)
    .bind(&record.facility_name)
    .bind(&record.street1)
    .bind(&record.street2)
    .bind(&record.city)
    .bind(&record.state)
    .bind(&record.postal_code)
    .bind(&record.company_key)
    .bind(&record.sku)
    .bind(&record.lot)
    .bind(record.quantity)
    .bind(record.distribution_date)
    .bind(&record.order_number)
    .bind(record.shipstation_shipment_id)
    .bind(SYNC_SOURCE)
    .fetch_one(pool)
    .await?;

    Ok(id)
}
