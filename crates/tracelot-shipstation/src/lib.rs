//! Typed client for the `ShipStation` REST API.
//!
//! Covers the three endpoints the sync pipeline consumes: the paginated
//! orders list, per-order detail, and the paginated per-order shipments
//! list. Transient failures (network errors, HTTP 429/5xx) are retried with
//! a bounded throttle-derived delay; everything else surfaces as a typed
//! [`ShipstationError`].

mod client;
mod error;
mod retry;
mod types;

pub use client::{ShipstationClient, PAGE_SIZE};
pub use error::ShipstationError;
pub use types::{
    AdvancedOptions, ItemWeight, Order, OrderItem, OrdersPage, Shipment, ShipTo, ShipmentsPage,
};
