//! Offline unit tests for tracelot-db pool configuration and row types.
//! These tests do not require a live database connection.

use std::path::PathBuf;

use tracelot_core::{AppConfig, Environment};
use tracelot_db::{
    DistributionHeaderRow, NewDistributionHeader, PoolConfig, SkippedOrderRow, SyncStatusRow,
};

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        shipstation_api_key: None,
        shipstation_api_secret: None,
        lot_log_path: PathBuf::from("./config/lot_log.csv"),
        default_rep_id: None,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        sync_window_days: 14,
        sync_max_orders: 500,
        sync_throttle_secs: 2,
        shipstation_list_timeout_secs: 60,
        shipstation_detail_timeout_secs: 30,
        shipstation_max_attempts: 5,
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`DistributionHeaderRow`] has all
/// expected fields with the correct types. No database required.
#[test]
fn distribution_header_row_has_expected_fields() {
    use chrono::Utc;

    let row = DistributionHeaderRow {
        id: 1_i64,
        distribution_number: Some("DIST-2026-00001".to_string()),
        order_number: "SO-1001".to_string(),
        ship_date: None,
        tracking_number: Some("1Z999".to_string()),
        shipstation_shipment_id: Some(9001_i64),
        rep_id: None,
        customer_id: None,
        source: "shipstation".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.id, 1);
    assert_eq!(row.distribution_number.as_deref(), Some("DIST-2026-00001"));
    assert_eq!(row.shipstation_shipment_id, Some(9001));
    assert_eq!(row.source, "shipstation");
}

#[test]
fn new_distribution_header_carries_shipment_identity() {
    let header = NewDistributionHeader {
        order_number: "SO-1001".to_string(),
        ship_date: None,
        tracking_number: None,
        shipstation_shipment_id: 9001,
        rep_id: Some(3),
        customer_id: Some(11),
    };

    assert_eq!(header.shipstation_shipment_id, 9001);
    assert_eq!(header.rep_id, Some(3));
}

/// Compile-time smoke test for [`SkippedOrderRow`].
#[test]
fn skipped_order_row_has_expected_fields() {
    use chrono::Utc;

    let row = SkippedOrderRow {
        id: 5_i64,
        shipstation_order_id: 1001_i64,
        order_number: Some("SO-1001".to_string()),
        reason: "fetch_error".to_string(),
        details: serde_json::json!({"error": "timeout"}),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.reason, "fetch_error");
    assert_eq!(row.details["error"], "timeout");
}

/// Compile-time smoke test for [`SyncStatusRow`].
#[test]
fn sync_status_row_has_expected_fields() {
    use chrono::Utc;

    let row = SyncStatusRow {
        id: 1_i32,
        synced: 10,
        skipped: 2,
        current_page: 3,
        status: "running".to_string(),
        message: "page 3".to_string(),
        started_at: Some(Utc::now()),
        updated_at: Utc::now(),
        error_message: None,
        cancel_requested: false,
    };

    assert_eq!(row.status, "running");
    assert!(!row.cancel_requested);
    assert!(row.error_message.is_none());
}
