//! The order/shipment fetch loop and reconciliation engine.
//!
//! One logical worker per run, no internal parallelism: orders are
//! processed in vendor return order, page by page, and shipments in list
//! order within an order. Every outbound call blocks the worker; backoff
//! uses plain sleeps. The relational store is the only shared resource and
//! every write is its own implicit transaction — concurrent runs are
//! prevented by the single-run status claim, not by database locking.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use sqlx::PgPool;

use tracelot_core::canonical::LEGACY_SAMPLE_SKU;
use tracelot_core::{canonicalize_sku, classify_quantity, ClassifierState, ItemMeasure};
use tracelot_db::{
    CustomerSummaryUpdate, NewDistributionHeader, NewDistributionRecord, NewSyncRun,
};
use tracelot_shipstation::{Order, OrderItem, Shipment, ShipstationClient};

use crate::candidates::extract_lot_assignments;
use crate::directory::{CustomerDirectory, ShipToFields};
use crate::error::SyncError;
use crate::lot_log::LotLog;
use crate::progress::{CancelProbe, ProgressSink, ProgressUpdate};

/// Lot recorded when an order has resolvable SKUs but no lot evidence.
pub const UNKNOWN_LOT: &str = "UNKNOWN";

/// Runaway guard on the page loop.
const MAX_PAGES: u32 = 200;

/// Progress is reported every Nth order within a page.
const PROGRESS_ORDER_STRIDE: usize = 5;

/// Progress is reported every Nth skipped order.
const PROGRESS_SKIP_STRIDE: i32 = 25;

/// Why an order was recorded in `skipped_orders`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AwaitingShipment,
    FetchError,
    DbUpsertFailed,
    LineItemInsertFailed,
    NewCustomerRecordUpsertFailed,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::AwaitingShipment => "awaiting_shipment",
            SkipReason::FetchError => "fetch_error",
            SkipReason::DbUpsertFailed => "db_upsert_failed",
            SkipReason::LineItemInsertFailed => "line_item_insert_failed",
            SkipReason::NewCustomerRecordUpsertFailed => "new_customer_record_upsert_failed",
        }
    }
}

/// Parameters for one sync invocation.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Overrides the window start; defaults to today minus `window_days`.
    pub start_date: Option<NaiveDate>,
    pub window_days: i64,
    /// Once this many orders have persisted, the run stops early and
    /// reports success with a "reached limit" message.
    pub max_orders: u32,
    /// Inter-page sleep, applied after every page, success or failure.
    pub throttle_secs: u64,
    pub lot_log_path: PathBuf,
}

/// Final counters and summary for a finished run.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub canceled: bool,
    /// Shipments persisted.
    pub synced: i32,
    /// Orders skipped with a diagnostic.
    pub skipped: i32,
    pub orders_seen: i32,
    pub shipments_seen: i32,
    pub duration_secs: i32,
    pub message: String,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    synced: i32,
    skipped: i32,
    orders_seen: i32,
    shipments_seen: i32,
    current_page: i32,
}

enum OrderOutcome {
    /// At least one shipment persisted.
    Synced,
    Skipped,
    Canceled,
}

/// The sync engine. All collaborators are injected; the engine owns no
/// global state and a fresh [`ClassifierState`] is built per run.
pub struct SyncEngine<'a> {
    pool: &'a PgPool,
    client: &'a ShipstationClient,
    directory: &'a dyn CustomerDirectory,
    progress: &'a dyn ProgressSink,
    cancel: &'a dyn CancelProbe,
    default_rep_id: Option<i64>,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        pool: &'a PgPool,
        client: &'a ShipstationClient,
        directory: &'a dyn CustomerDirectory,
        progress: &'a dyn ProgressSink,
        cancel: &'a dyn CancelProbe,
        default_rep_id: Option<i64>,
    ) -> Self {
        Self {
            pool,
            client,
            directory,
            progress,
            cancel,
            default_rep_id,
        }
    }

    /// Runs one full sync: claims the status row, pages through the order
    /// window, reconciles each order, and records the run summary.
    ///
    /// Individual order and shipment failures degrade to diagnostics; the
    /// run as a whole fails only on run-level preconditions (status row
    /// already claimed, unreadable lot log).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Db`] wrapping
    /// [`tracelot_db::DbError::SyncRunActive`] when another run holds the
    /// status row, or [`SyncError::LotLog`] when the lot log exists but
    /// cannot be parsed.
    pub async fn run(&self, options: &SyncOptions) -> Result<SyncOutcome, SyncError> {
        let started = Instant::now();
        tracelot_db::begin_sync_status(self.pool, "sync starting").await?;

        match self.run_inner(options, started).await {
            Ok(outcome) => {
                if let Err(e) = tracelot_db::finish_sync_status(
                    self.pool,
                    "completed",
                    &outcome.message,
                    None,
                )
                .await
                {
                    tracing::warn!(error = %e, "failed to finalize sync status");
                }
                let run = NewSyncRun {
                    synced: outcome.synced,
                    skipped: outcome.skipped,
                    orders_seen: outcome.orders_seen,
                    shipments_seen: outcome.shipments_seen,
                    duration_secs: outcome.duration_secs,
                    message: outcome.message.clone(),
                };
                if let Err(e) = tracelot_db::insert_sync_run(self.pool, &run).await {
                    tracing::warn!(error = %e, "failed to record sync run summary");
                }
                Ok(outcome)
            }
            Err(e) => {
                let detail = e.to_string();
                if let Err(fe) =
                    tracelot_db::finish_sync_status(self.pool, "error", "sync failed", Some(&detail))
                        .await
                {
                    tracing::warn!(error = %fe, "failed to finalize sync status after error");
                }
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        options: &SyncOptions,
        started: Instant,
    ) -> Result<SyncOutcome, SyncError> {
        let lot_log = LotLog::load(&options.lot_log_path)?;
        let mut state = ClassifierState::new();
        let mut counters = Counters::default();

        let today = Utc::now().date_naive();
        let start = options
            .start_date
            .unwrap_or_else(|| today - ChronoDuration::days(options.window_days));
        let end = today + ChronoDuration::days(1);
        let window_start = format!("{start} 00:00:00");
        let window_end = format!("{end} 00:00:00");

        tracing::info!(%window_start, %window_end, "starting order sync");

        let mut orders_synced: u32 = 0;
        let mut reached_limit = false;
        let mut page: u32 = 1;
        let mut total_pages: Option<i64> = None;

        'pages: while page <= MAX_PAGES {
            if self.cancel.is_canceled().await {
                return Ok(self.canceled_outcome(&counters, started));
            }
            counters.current_page = i32::try_from(page).unwrap_or(i32::MAX);
            self.report(&counters, format!("fetching page {page}")).await;

            match self
                .client
                .list_orders_page(&window_start, &window_end, page)
                .await
            {
                Ok(orders_page) => {
                    total_pages = Some(orders_page.pages);
                    self.report(
                        &counters,
                        format!("page {page}: {} orders", orders_page.orders.len()),
                    )
                    .await;

                    if orders_page.orders.is_empty() {
                        break;
                    }

                    for (idx, stub) in orders_page.orders.iter().enumerate() {
                        counters.orders_seen += 1;
                        if idx % PROGRESS_ORDER_STRIDE == 0 {
                            self.report(
                                &counters,
                                format!("processing order {}", stub.order_number),
                            )
                            .await;
                        }

                        match self
                            .process_order(stub, &lot_log, &mut state, &mut counters)
                            .await
                        {
                            OrderOutcome::Canceled => {
                                return Ok(self.canceled_outcome(&counters, started));
                            }
                            OrderOutcome::Synced => {
                                orders_synced += 1;
                                if orders_synced >= options.max_orders {
                                    reached_limit = true;
                                    break 'pages;
                                }
                            }
                            OrderOutcome::Skipped => {}
                        }
                    }

                    if i64::from(page) >= orders_page.pages {
                        break;
                    }
                }
                Err(e) => {
                    // The page is abandoned; the loop continues so one bad
                    // page never aborts the run.
                    tracing::warn!(page, error = %e, "orders page fetch failed after retries");
                    if let Some(tp) = total_pages {
                        if i64::from(page) >= tp {
                            break;
                        }
                    }
                }
            }

            if options.throttle_secs > 0 {
                tokio::time::sleep(Duration::from_secs(options.throttle_secs)).await;
            }
            page += 1;
        }

        let duration_secs = elapsed_secs(started);
        let message = if reached_limit {
            format!(
                "reached limit of {} orders: synced {} shipments, skipped {} of {} orders in {}s",
                options.max_orders,
                counters.synced,
                counters.skipped,
                counters.orders_seen,
                duration_secs
            )
        } else {
            format!(
                "synced {} shipments, skipped {} of {} orders ({} shipments seen) in {}s",
                counters.synced,
                counters.skipped,
                counters.orders_seen,
                counters.shipments_seen,
                duration_secs
            )
        };

        Ok(SyncOutcome {
            canceled: false,
            synced: counters.synced,
            skipped: counters.skipped,
            orders_seen: counters.orders_seen,
            shipments_seen: counters.shipments_seen,
            duration_secs,
            message,
        })
    }

    /// Fetches detail and shipments for one order stub and reconciles it.
    /// Never returns an error: every failure path degrades to a diagnostic.
    async fn process_order(
        &self,
        stub: &Order,
        lot_log: &LotLog,
        state: &mut ClassifierState,
        counters: &mut Counters,
    ) -> OrderOutcome {
        let order = match self.client.get_order(stub.order_id).await {
            Ok(order) => order,
            Err(e) => {
                self.record_skip(
                    stub.order_id,
                    Some(&stub.order_number),
                    SkipReason::FetchError,
                    serde_json::json!({ "phase": "order_detail", "error": e.to_string() }),
                    counters,
                )
                .await;
                return OrderOutcome::Skipped;
            }
        };

        if !order.is_shipped() {
            self.record_skip(
                order.order_id,
                Some(&order.order_number),
                SkipReason::AwaitingShipment,
                serde_json::json!({ "order_status": order.order_status }),
                counters,
            )
            .await;
            return OrderOutcome::Skipped;
        }

        let mut shipments = match self.client.list_shipments(order.order_id).await {
            Ok(shipments) => shipments,
            Err(e) => {
                self.record_skip(
                    order.order_id,
                    Some(&order.order_number),
                    SkipReason::FetchError,
                    serde_json::json!({ "phase": "shipments", "error": e.to_string() }),
                    counters,
                )
                .await;
                return OrderOutcome::Skipped;
            }
        };

        // A shipped order with no shipment rows still produces one persisted
        // shipment, synthesized from the order's own items and order date.
        if shipments.is_empty() {
            shipments.push(Shipment {
                shipment_id: None,
                order_id: Some(order.order_id),
                tracking_number: None,
                ship_date: order.order_date.clone(),
                shipment_items: Some(order.items.clone()),
            });
        }

        self.reconcile_order(&order, &shipments, lot_log, state, counters)
            .await
    }

    /// Maps an order's evidence onto its shipments and upserts the ledger.
    async fn reconcile_order(
        &self,
        order: &Order,
        shipments: &[Shipment],
        lot_log: &LotLog,
        state: &mut ClassifierState,
        counters: &mut Counters,
    ) -> OrderOutcome {
        let order_units = aggregate_units(&order.items, state);
        let (custom1, custom2) = order
            .advanced_options
            .as_ref()
            .map_or((None, None), |o| {
                (o.custom_field1.as_deref(), o.custom_field2.as_deref())
            });
        let lot_by_sku = extract_lot_assignments(
            order.internal_notes.as_deref(),
            custom1,
            custom2,
            &order_units,
            lot_log,
        );

        // Customer resolution degrades to "default rep, no customer link" on
        // any directory failure rather than aborting the order.
        let ship_fields = order.ship_to.as_ref().map(ShipToFields::from_ship_to);
        let mut customer_id: Option<i64> = None;
        let mut rep_id = self.default_rep_id;
        if let Some(fields) = &ship_fields {
            match self.directory.resolve_or_create(fields).await {
                Ok(customer) => customer_id = Some(customer.id),
                Err(e) => {
                    tracing::warn!(order = %order.order_number, error = %e, "customer resolution failed");
                }
            }
            if let Some(cid) = customer_id {
                match self
                    .directory
                    .pick_responsible_rep(cid, self.default_rep_id)
                    .await
                {
                    Ok(picked) => rep_id = picked,
                    Err(e) => {
                        tracing::warn!(order = %order.order_number, error = %e, "rep selection failed");
                        rep_id = self.default_rep_id;
                    }
                }
                if let Some(rid) = rep_id {
                    if let Err(e) = self.directory.assign_rep(cid, rid, true).await {
                        tracing::warn!(order = %order.order_number, error = %e, "rep assignment failed");
                    }
                }
            }
        }

        // Pre-sync aggregation artifacts for this order are superseded by
        // per-shipment rows on every run.
        if let Err(e) =
            tracelot_db::delete_legacy_headers_for_order(self.pool, &order.order_number).await
        {
            tracing::warn!(order = %order.order_number, error = %e, "legacy header cleanup failed");
        }

        let order_date = order.order_date.as_deref().and_then(parse_vendor_date);
        let mut remaining = order_units;
        let mut any_synced = false;
        let mut any_failed = false;

        for (idx, shipment) in shipments.iter().enumerate() {
            if self.cancel.is_canceled().await {
                return OrderOutcome::Canceled;
            }
            counters.shipments_seen += 1;
            self.report(
                counters,
                format!("order {}: shipment {}", order.order_number, idx + 1),
            )
            .await;

            let shipment_units =
                take_shipment_units(shipment.shipment_items.as_deref(), &mut remaining, state);
            let external_id = shipment
                .shipment_id
                .unwrap_or_else(|| fallback_shipment_id(order.order_id, idx));
            let ship_date = shipment
                .ship_date
                .as_deref()
                .and_then(parse_vendor_date)
                .or(order_date);

            match self
                .persist_shipment(
                    order,
                    external_id,
                    ship_date,
                    shipment,
                    &shipment_units,
                    &lot_by_sku,
                    ship_fields.as_ref(),
                    customer_id,
                    rep_id,
                )
                .await
            {
                Ok(()) => {
                    any_synced = true;
                    counters.synced += 1;
                    self.report(
                        counters,
                        format!("synced shipment {external_id} of order {}", order.order_number),
                    )
                    .await;
                }
                Err((reason, detail)) => {
                    any_failed = true;
                    self.record_skip(
                        order.order_id,
                        Some(&order.order_number),
                        reason,
                        serde_json::json!({
                            "shipment_id": external_id,
                            "error": detail,
                        }),
                        counters,
                    )
                    .await;
                }
            }
        }

        if any_synced {
            OrderOutcome::Synced
        } else {
            debug_assert!(any_failed, "shipments list is never empty here");
            OrderOutcome::Skipped
        }
    }

    /// Upserts the header and line records for one shipment. Any database
    /// error aborts only this shipment.
    #[allow(clippy::too_many_arguments)]
    async fn persist_shipment(
        &self,
        order: &Order,
        external_id: i64,
        ship_date: Option<NaiveDate>,
        shipment: &Shipment,
        shipment_units: &HashMap<String, i32>,
        lot_by_sku: &HashMap<String, String>,
        ship_fields: Option<&ShipToFields>,
        customer_id: Option<i64>,
        rep_id: Option<i64>,
    ) -> Result<(), (SkipReason, String)> {
        let header = NewDistributionHeader {
            order_number: order.order_number.clone(),
            ship_date,
            tracking_number: shipment.tracking_number.clone(),
            shipstation_shipment_id: external_id,
            rep_id,
            customer_id,
        };

        let header_id = match tracelot_db::find_header_by_shipment_id(self.pool, external_id).await
        {
            Ok(Some(existing)) => {
                if let Err(e) =
                    tracelot_db::update_sync_header(self.pool, existing.id, &header).await
                {
                    return Err((SkipReason::DbUpsertFailed, e.to_string()));
                }
                // Clear this header's prior sync rows before reinsertion;
                // records from other subsystems are left alone.
                if let Err(e) =
                    tracelot_db::delete_sync_records_for_header(self.pool, existing.id).await
                {
                    return Err((SkipReason::DbUpsertFailed, e.to_string()));
                }
                existing.id
            }
            Ok(None) => match tracelot_db::insert_sync_header(self.pool, &header).await {
                Ok(id) => id,
                Err(e) => return Err((SkipReason::DbUpsertFailed, e.to_string())),
            },
            Err(e) => return Err((SkipReason::DbUpsertFailed, e.to_string())),
        };

        let mut total_units: i32 = 0;
        for (sku, lot, units) in plan_lines(shipment_units, lot_by_sku) {
            let record = NewDistributionRecord {
                header_id,
                facility_name: ship_fields.map(|f| f.facility_name.clone()),
                street1: ship_fields.and_then(|f| f.street1.clone()),
                street2: ship_fields.and_then(|f| f.street2.clone()),
                city: ship_fields.and_then(|f| f.city.clone()),
                state: ship_fields.and_then(|f| f.state.clone()),
                postal_code: ship_fields.and_then(|f| f.postal_code.clone()),
                company_key: ship_fields.map(|f| f.company_key.clone()),
                sku,
                lot,
                quantity: units,
                distribution_date: ship_date,
                order_number: order.order_number.clone(),
                shipstation_shipment_id: external_id,
            };
            if let Err(e) = tracelot_db::insert_sync_record(self.pool, &record).await {
                return Err((SkipReason::LineItemInsertFailed, e.to_string()));
            }
            total_units = total_units.saturating_add(units);
        }

        if let Some(fields) = ship_fields {
            let summary = CustomerSummaryUpdate {
                company_key: fields.company_key.clone(),
                facility_name: fields.facility_name.clone(),
                street1: fields.street1.clone(),
                city: fields.city.clone(),
                state: fields.state.clone(),
                postal_code: fields.postal_code.clone(),
                last_distribution_date: ship_date,
                units: total_units,
            };
            if let Err(e) = tracelot_db::upsert_customer_summary(self.pool, &summary).await {
                return Err((SkipReason::NewCustomerRecordUpsertFailed, e.to_string()));
            }
        }

        Ok(())
    }

    /// Upserts the diagnostic row and bumps the skip counter; reporting is
    /// throttled to every 25th skip.
    async fn record_skip(
        &self,
        order_id: i64,
        order_number: Option<&str>,
        reason: SkipReason,
        details: serde_json::Value,
        counters: &mut Counters,
    ) {
        tracing::warn!(order_id, reason = reason.as_str(), %details, "order skipped");
        if let Err(e) = tracelot_db::upsert_skipped_order(
            self.pool,
            order_id,
            order_number,
            reason.as_str(),
            &details,
        )
        .await
        {
            tracing::warn!(order_id, error = %e, "failed to record skip diagnostic");
        }
        counters.skipped += 1;
        if counters.skipped % PROGRESS_SKIP_STRIDE == 0 {
            self.report(counters, format!("{} orders skipped so far", counters.skipped))
                .await;
        }
    }

    fn canceled_outcome(&self, counters: &Counters, started: Instant) -> SyncOutcome {
        let duration_secs = elapsed_secs(started);
        SyncOutcome {
            canceled: true,
            synced: counters.synced,
            skipped: counters.skipped,
            orders_seen: counters.orders_seen,
            shipments_seen: counters.shipments_seen,
            duration_secs,
            message: format!(
                "canceled after {} shipments synced, {} orders skipped",
                counters.synced, counters.skipped
            ),
        }
    }

    async fn report(&self, counters: &Counters, message: String) {
        self.progress
            .report(&ProgressUpdate {
                synced: counters.synced,
                skipped: counters.skipped,
                current_page: counters.current_page,
                status: "running",
                message,
            })
            .await;
    }
}

/// Canonicalizes and expands an item list into units per canonical SKU.
///
/// Each item teaches the classifier first (explicit pack/single names with
/// weights update the baselines), then is classified, so an unambiguous
/// item can disambiguate a later ambiguous one in the same list. The legacy
/// sample SKU is dropped as noise.
pub(crate) fn aggregate_units(
    items: &[OrderItem],
    state: &mut ClassifierState,
) -> HashMap<String, i32> {
    let mut units_by_sku: HashMap<String, i32> = HashMap::new();
    for item in items {
        let sku = item
            .sku
            .as_deref()
            .and_then(canonicalize_sku)
            .or_else(|| item.name.as_deref().and_then(canonicalize_sku));
        let Some(sku) = sku else {
            continue;
        };
        if sku == LEGACY_SAMPLE_SKU {
            continue;
        }

        let measure = ItemMeasure {
            name: item.name.as_deref().unwrap_or(""),
            quantity: item.quantity,
            total_weight: item.weight.map(|w| w.value),
            sku: Some(&sku),
        };
        state.observe(&measure);
        let (_packs, units) = classify_quantity(&measure, state);
        if units > 0 {
            *units_by_sku.entry(sku).or_insert(0) += units;
        }
    }
    units_by_sku
}

/// Resolves the unit map for one shipment: its own item list when
/// non-empty, otherwise the entire remaining order-level map — which is
/// drained, so only the first zero-item shipment of an order receives the
/// fallback allocation and later zero-item shipments get nothing. Known
/// approximation for multi-shipment orders lacking per-shipment items;
/// preserved as-is.
pub(crate) fn take_shipment_units(
    shipment_items: Option<&[OrderItem]>,
    remaining: &mut HashMap<String, i32>,
    state: &mut ClassifierState,
) -> HashMap<String, i32> {
    match shipment_items {
        Some(items) if !items.is_empty() => aggregate_units(items, state),
        _ => std::mem::take(remaining),
    }
}

/// Orders the (SKU, lot, units) triples for insertion. SKUs without a
/// discovered lot get [`UNKNOWN_LOT`]; non-positive unit counts are
/// dropped. Sorted by SKU for deterministic insert order.
pub(crate) fn plan_lines(
    units_by_sku: &HashMap<String, i32>,
    lot_by_sku: &HashMap<String, String>,
) -> Vec<(String, String, i32)> {
    let mut lines: Vec<(String, String, i32)> = units_by_sku
        .iter()
        .filter(|(_, units)| **units > 0)
        .map(|(sku, units)| {
            let lot = lot_by_sku
                .get(sku)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_LOT.to_owned());
            (sku.clone(), lot, *units)
        })
        .collect();
    lines.sort();
    lines
}

/// Synthesized identity for shipments the vendor returned without an id.
/// Negative and order-derived, so it can never collide with the vendor's
/// positive shipment ids.
fn fallback_shipment_id(order_id: i64, index: usize) -> i64 {
    -(order_id * 100 + i64::try_from(index).unwrap_or(0))
}

/// Parses the leading `YYYY-MM-DD` of a vendor timestamp string.
fn parse_vendor_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()
}

fn elapsed_secs(started: Instant) -> i32 {
    i32::try_from(started.elapsed().as_secs()).unwrap_or(i32::MAX)
}
