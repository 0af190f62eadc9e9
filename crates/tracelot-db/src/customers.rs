//! Database operations for `customers`, `rep_assignments`, and
//! `customer_summaries`.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `customers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: i64,
    pub facility_name: String,
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    /// Normalized dedup key; unique.
    pub company_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a customer from an order's ship-to block.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub facility_name: String,
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub company_key: String,
}

/// Fields for the per-shipment denormalized summary upsert.
#[derive(Debug, Clone)]
pub struct CustomerSummaryUpdate {
    pub company_key: String,
    pub facility_name: String,
    pub street1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub last_distribution_date: Option<NaiveDate>,
    pub units: i32,
}

// ---------------------------------------------------------------------------
// customers operations
// ---------------------------------------------------------------------------

const CUSTOMER_COLUMNS: &str = "id, facility_name, street1, street2, city, state, postal_code, \
     company_key, created_at, updated_at";

/// Looks up a customer by its normalized company key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_customer_by_company_key(
    pool: &PgPool,
    company_key: &str,
) -> Result<Option<CustomerRow>, DbError> {
    let row = sqlx::query_as::<_, CustomerRow>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE company_key = $1",
    ))
    .bind(company_key)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Inserts a customer, returning the full new row. A concurrent insert of
/// the same company key resolves to the existing row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_customer(pool: &PgPool, customer: &NewCustomer) -> Result<CustomerRow, DbError> {
    let row = sqlx::query_as::<_, CustomerRow>(&format!(
        "INSERT INTO customers \
             (facility_name, street1, street2, city, state, postal_code, company_key) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (company_key) DO UPDATE SET updated_at = NOW() \
         RETURNING {CUSTOMER_COLUMNS}",
    ))
    .bind(&customer.facility_name)
    .bind(&customer.street1)
    .bind(&customer.street2)
    .bind(&customer.city)
    .bind(&customer.state)
    .bind(&customer.postal_code)
    .bind(&customer.company_key)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// rep_assignments operations
// ---------------------------------------------------------------------------

/// Returns the primary rep id for a customer, if one is assigned.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_primary_rep_id(pool: &PgPool, customer_id: i64) -> Result<Option<i64>, DbError> {
    let rep_id: Option<i64> = sqlx::query_scalar::<_, i64>(
        "SELECT rep_id FROM rep_assignments \
         WHERE customer_id = $1 AND is_primary \
         LIMIT 1",
    )
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;

    Ok(rep_id)
}

/// Returns `true` when the customer has any rep assignment at all.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn has_rep_assignment(pool: &PgPool, customer_id: i64) -> Result<bool, DbError> {
    let count: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rep_assignments WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_one(pool)
            .await?;

    Ok(count > 0)
}

/// Records a rep assignment. Conflicts on `(customer_id, rep_id)` are
/// ignored; an existing primary is never demoted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_rep_assignment(
    pool: &PgPool,
    customer_id: i64,
    rep_id: i64,
    is_primary: bool,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO rep_assignments (customer_id, rep_id, is_primary) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (customer_id, rep_id) DO NOTHING",
    )
    .bind(customer_id)
    .bind(rep_id)
    .bind(is_primary)
    .execute(pool)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// customer_summaries operations
// ---------------------------------------------------------------------------

/// Upserts the denormalized per-facility summary row.
///
/// Conflicts on `company_key` refresh the address fields, advance
/// `last_distribution_date` monotonically, and accumulate `total_units`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_customer_summary(
    pool: &PgPool,
    update: &CustomerSummaryUpdate,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO customer_summaries \
             (company_key, facility_name, street1, city, state, postal_code, \
              last_distribution_date, total_units) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (company_key) DO UPDATE SET \
             facility_name          = EXCLUDED.facility_name, \
             street1                = EXCLUDED.street1, \
             city                   = EXCLUDED.city, \
             state                  = EXCLUDED.state, \
             postal_code            = EXCLUDED.postal_code, \
             last_distribution_date = GREATEST(customer_summaries.last_distribution_date, \
                                               EXCLUDED.last_distribution_date), \
             total_units            = customer_summaries.total_units + EXCLUDED.total_units, \
             updated_at             = NOW()",
    )
    .bind(&update.company_key)
    .bind(&update.facility_name)
    .bind(&update.street1)
    .bind(&update.city)
    .bind(&update.state)
    .bind(&update.postal_code)
    .bind(update.last_distribution_date)
    .bind(update.units)
    .execute(pool)
    .await?;

    Ok(())
}
