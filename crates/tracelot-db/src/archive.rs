//! Archive tables for the destructive rebuild operation.
//!
//! [`archive_sync_rows`] copies every sync-sourced row into timestamped
//! archive tables; [`delete_sync_rows`] removes the live rows afterwards.
//! The two are deliberately separate functions: the rebuild operation must
//! archive first and only delete once every archival insert has succeeded.
//! Archive tables are created on demand with explicit column lists (not
//! `LIKE`) so old archives keep working across live-schema drift, and the
//! copy insert is conflict-safe so a re-run after a partial failure does
//! not duplicate rows.

use sqlx::PgPool;

use crate::distributions::SYNC_SOURCE;
use crate::DbError;

/// Row counts copied by [`archive_sync_rows`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveCounts {
    pub headers: u64,
    pub records: u64,
    pub summaries: u64,
}

/// Validates the table-name suffix: a 14-digit `YYYYMMDDHHMMSS` timestamp.
///
/// The suffix is interpolated into DDL, so anything but digits is rejected
/// outright.
fn validate_suffix(suffix: &str) -> Result<(), DbError> {
    let ok = suffix.len() == 14 && suffix.bytes().all(|b| b.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(DbError::InvalidArchiveSuffix(suffix.to_owned()))
    }
}

/// Copies all sync-sourced headers, line records, and customer summaries
/// into `archive_*_<suffix>` tables, creating them if needed.
///
/// No live row is modified. Returns the per-table copy counts.
///
/// # Errors
///
/// Returns [`DbError::InvalidArchiveSuffix`] for a malformed suffix, or
/// [`DbError::Sqlx`] if any DDL or copy statement fails — in which case the
/// caller must not proceed to [`delete_sync_rows`].
pub async fn archive_sync_rows(pool: &PgPool, suffix: &str) -> Result<ArchiveCounts, DbError> {
    validate_suffix(suffix)?;

    let mut counts = ArchiveCounts::default();

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS archive_distribution_headers_{suffix} ( \
             id BIGINT PRIMARY KEY, \
             distribution_number TEXT, \
             order_number TEXT, \
             ship_date DATE, \
             tracking_number TEXT, \
             shipstation_shipment_id BIGINT, \
             rep_id BIGINT, \
             customer_id BIGINT, \
             source TEXT, \
             created_at TIMESTAMPTZ, \
             updated_at TIMESTAMPTZ \
         )"
    ))
    .execute(pool)
    .await?;

    let result = sqlx::query(&format!(
        "INSERT INTO archive_distribution_headers_{suffix} \
             (id, distribution_number, order_number, ship_date, tracking_number, \
              shipstation_shipment_id, rep_id, customer_id, source, created_at, updated_at) \
         SELECT id, distribution_number, order_number, ship_date, tracking_number, \
                shipstation_shipment_id, rep_id, customer_id, source, created_at, updated_at \
         FROM distribution_headers WHERE source = $1 \
         ON CONFLICT (id) DO NOTHING"
    ))
    .bind(SYNC_SOURCE)
    .execute(pool)
    .await?;
    counts.headers = result.rows_affected();

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS archive_distribution_records_{suffix} ( \
             id BIGINT PRIMARY KEY, \
             header_id BIGINT, \
             facility_name TEXT, \
             street1 TEXT, \
             street2 TEXT, \
             city TEXT, \
             state TEXT, \
             postal_code TEXT, \
             company_key TEXT, \
             sku TEXT, \
             lot TEXT, \
             quantity INTEGER, \
             distribution_date DATE, \
             order_number TEXT, \
             shipstation_shipment_id BIGINT, \
             source TEXT, \
             created_at TIMESTAMPTZ \
         )"
    ))
    .execute(pool)
    .await?;

    let result = sqlx::query(&format!(
        "INSERT INTO archive_distribution_records_{suffix} \
             (id, header_id, facility_name, street1, street2, city, state, postal_code, \
              company_key, sku, lot, quantity, distribution_date, order_number, \
              shipstation_shipment_id, source, created_at) \
         SELECT id, header_id, facility_name, street1, street2, city, state, postal_code, \
                company_key, sku, lot, quantity, distribution_date, order_number, \
                shipstation_shipment_id, source, created_at \
         FROM distribution_records WHERE source = $1 \
         ON CONFLICT (id) DO NOTHING"
    ))
    .bind(SYNC_SOURCE)
    .execute(pool)
    .await?;
    counts.records = result.rows_affected();

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS archive_customer_summaries_{suffix} ( \
             id BIGINT PRIMARY KEY, \
             company_key TEXT, \
             facility_name TEXT, \
             street1 TEXT, \
             city TEXT, \
             state TEXT, \
             postal_code TEXT, \
             last_distribution_date DATE, \
             total_units BIGINT, \
             created_at TIMESTAMPTZ, \
             updated_at TIMESTAMPTZ \
         )"
    ))
    .execute(pool)
    .await?;

    let result = sqlx::query(&format!(
        "INSERT INTO archive_customer_summaries_{suffix} \
             (id, company_key, facility_name, street1, city, state, postal_code, \
              last_distribution_date, total_units, created_at, updated_at) \
         SELECT id, company_key, facility_name, street1, city, state, postal_code, \
                last_distribution_date, total_units, created_at, updated_at \
         FROM customer_summaries \
         ON CONFLICT (id) DO NOTHING"
    ))
    .execute(pool)
    .await?;
    counts.summaries = result.rows_affected();

    Ok(counts)
}

/// Deletes the live sync-sourced rows after archival: line records first,
/// then headers, then the (wholly sync-derived) customer summaries.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any delete fails.
pub async fn delete_sync_rows(pool: &PgPool) -> Result<ArchiveCounts, DbError> {
    let mut counts = ArchiveCounts::default();

    let result = sqlx::query("DELETE FROM distribution_records WHERE source = $1")
        .bind(SYNC_SOURCE)
        .execute(pool)
        .await?;
    counts.records = result.rows_affected();

    let result = sqlx::query("DELETE FROM distribution_headers WHERE source = $1")
        .bind(SYNC_SOURCE)
        .execute(pool)
        .await?;
    counts.headers = result.rows_affected();

    let result = sqlx::query("DELETE FROM customer_summaries")
        .execute(pool)
        .await?;
    counts.summaries = result.rows_affected();

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_timestamp_suffix_passes() {
        assert!(validate_suffix("20260807093000").is_ok());
    }

    #[test]
    fn malformed_suffixes_are_rejected() {
        for bad in ["", "2026", "20260807093000x", "2026-08-07; DROP", "aaaaaaaaaaaaaa"] {
            let err = validate_suffix(bad).unwrap_err();
            assert!(
                matches!(err, DbError::InvalidArchiveSuffix(_)),
                "suffix {bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn invalid_suffix_fails_before_any_database_work() {
        // A lazy pool never opens a connection; the suffix check must fire
        // first so a malformed suffix can never reach DDL.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .expect("lazy pool construction");
        let err = archive_sync_rows(&pool, "bogus").await.unwrap_err();
        assert!(matches!(err, DbError::InvalidArchiveSuffix(_)));
    }
}
