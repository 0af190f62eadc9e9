//! Order-ingestion and SKU/lot reconciliation pipeline.
//!
//! Pages through the `ShipStation` orders API for a date window, extracts
//! (SKU, lot, quantity) evidence from item lists, internal notes, and custom
//! fields, disambiguates 10-pack vs single-unit line items with a per-run
//! weight heuristic, and idempotently upserts the distribution ledger keyed
//! by vendor shipment id.
//!
//! The engine never aborts a whole run over a single order: transient fetch
//! failures are retried then recorded as skips, persistence failures are
//! isolated per shipment, and everything lands in the `skipped_orders`
//! diagnostics table with a reason code. Cancellation is cooperative,
//! polled at page and shipment boundaries.

mod candidates;
mod directory;
mod engine;
mod error;
mod lot_log;
mod progress;
mod rebuild;

pub use candidates::{extract_lot_assignments, LotCandidate};
pub use directory::{CustomerDirectory, PgCustomerDirectory, ShipToFields};
pub use engine::{SkipReason, SyncEngine, SyncOptions, SyncOutcome, UNKNOWN_LOT};
pub use error::SyncError;
pub use lot_log::LotLog;
pub use progress::{
    CancelProbe, NeverCancel, PgCancelProbe, PgProgressSink, ProgressSink, ProgressUpdate,
};
pub use rebuild::{archive_and_rebuild, REBUILD_START_DATE};
