//! HTTP client for the `ShipStation` REST API.
//!
//! Wraps `reqwest` with basic-auth credential handling, per-endpoint
//! timeouts (list calls get a longer budget than detail calls, reflecting
//! expected response size), and bounded retry via
//! [`crate::retry::retry_with_throttle`].

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};

use crate::error::ShipstationError;
use crate::retry::retry_with_throttle;
use crate::types::{Order, OrdersPage, Shipment, ShipmentsPage};

const DEFAULT_BASE_URL: &str = "https://ssapi.shipstation.com/";

/// Fixed page size for the orders and shipments listings.
pub const PAGE_SIZE: u32 = 100;

/// Client for the `ShipStation` REST API.
///
/// Use [`ShipstationClient::new`] for production or
/// [`ShipstationClient::with_base_url`] to point at a mock server in tests.
pub struct ShipstationClient {
    client: Client,
    api_key: String,
    api_secret: String,
    base_url: Url,
    list_timeout: Duration,
    detail_timeout: Duration,
    max_attempts: u32,
    throttle_secs: u64,
}

impl ShipstationClient {
    /// Creates a new client pointed at the production `ShipStation` API.
    ///
    /// # Errors
    ///
    /// Returns [`ShipstationError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: &str,
        api_secret: &str,
        list_timeout_secs: u64,
        detail_timeout_secs: u64,
        max_attempts: u32,
        throttle_secs: u64,
    ) -> Result<Self, ShipstationError> {
        Self::with_base_url(
            api_key,
            api_secret,
            list_timeout_secs,
            detail_timeout_secs,
            max_attempts,
            throttle_secs,
            DEFAULT_BASE_URL,
        )
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ShipstationError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ShipstationError::InvalidBaseUrl`] if
    /// `base_url` is not a valid URL.
    #[allow(clippy::too_many_arguments)]
    pub fn with_base_url(
        api_key: &str,
        api_secret: &str,
        list_timeout_secs: u64,
        detail_timeout_secs: u64,
        max_attempts: u32,
        throttle_secs: u64,
        base_url: &str,
    ) -> Result<Self, ShipstationError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent("tracelot/0.1 (distribution-tracing)")
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // joined endpoint paths resolve under it rather than replacing the
        // last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| ShipstationError::InvalidBaseUrl(format!("'{normalised}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            api_secret: api_secret.to_owned(),
            base_url,
            list_timeout: Duration::from_secs(list_timeout_secs),
            detail_timeout: Duration::from_secs(detail_timeout_secs),
            max_attempts,
            throttle_secs,
        })
    }

    /// Fetches one page of orders created inside `[create_date_start,
    /// create_date_end]`, sorted oldest-first.
    ///
    /// Date bounds use the `ShipStation` timestamp format
    /// (`YYYY-MM-DD HH:MM:SS`). Retries transient failures per the client's
    /// retry policy.
    ///
    /// # Errors
    ///
    /// - [`ShipstationError::RateLimited`] — HTTP 429 after all attempts.
    /// - [`ShipstationError::Http`] — network failure or non-2xx status.
    /// - [`ShipstationError::Deserialize`] — unexpected response shape.
    pub async fn list_orders_page(
        &self,
        create_date_start: &str,
        create_date_end: &str,
        page: u32,
    ) -> Result<OrdersPage, ShipstationError> {
        let url = self.build_url(
            "orders",
            &[
                ("createDateStart", create_date_start),
                ("createDateEnd", create_date_end),
                ("page", &page.to_string()),
                ("pageSize", &PAGE_SIZE.to_string()),
                ("sortBy", "CreateDate"),
                ("sortDir", "ASC"),
            ],
        );
        retry_with_throttle(self.max_attempts, self.throttle_secs, || {
            self.request_json::<OrdersPage>(url.clone(), self.list_timeout, "listOrders")
        })
        .await
    }

    /// Fetches full order detail (items, notes, custom fields) by order id.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::list_orders_page`].
    pub async fn get_order(&self, order_id: i64) -> Result<Order, ShipstationError> {
        let url = self.build_url(&format!("orders/{order_id}"), &[]);
        retry_with_throttle(self.max_attempts, self.throttle_secs, || {
            self.request_json::<Order>(url.clone(), self.detail_timeout, "getOrder")
        })
        .await
    }

    /// Fetches every shipment for an order, accumulating across sub-pages
    /// until a short page is returned.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::list_orders_page`]; a failure on any
    /// sub-page fails the whole listing.
    pub async fn list_shipments(&self, order_id: i64) -> Result<Vec<Shipment>, ShipstationError> {
        let mut shipments: Vec<Shipment> = Vec::new();
        let mut page = 1u32;
        loop {
            let url = self.build_url(
                "shipments",
                &[
                    ("orderId", &order_id.to_string()),
                    ("page", &page.to_string()),
                    ("pageSize", &PAGE_SIZE.to_string()),
                ],
            );
            let batch = retry_with_throttle(self.max_attempts, self.throttle_secs, || {
                self.request_json::<ShipmentsPage>(url.clone(), self.list_timeout, "listShipments")
            })
            .await?;

            let count = batch.shipments.len();
            shipments.extend(batch.shipments);
            if count < PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }
        Ok(shipments)
    }

    /// Builds the full request URL with percent-encoded query parameters.
    fn build_url(&self, path: &str, params: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        // Paths are fixed literals plus numeric ids; join cannot fail here.
        if let Ok(joined) = self.base_url.join(path) {
            url = joined;
        }
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        url
    }

    /// Sends an authenticated GET, maps 429 to [`ShipstationError::RateLimited`],
    /// asserts 2xx, and parses the body as JSON.
    async fn request_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        timeout: Duration,
        context: &str,
    ) -> Result<T, ShipstationError> {
        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .timeout(timeout)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(ShipstationError::RateLimited { retry_after_secs });
        }

        let response = response.error_for_status()?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ShipstationError::Deserialize {
            context: format!("{context}({url})"),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> ShipstationClient {
        ShipstationClient::with_base_url("key", "secret", 30, 10, 5, 0, base_url)
            .expect("client construction should not fail")
    }

    #[test]
    fn build_url_joins_path_under_base() {
        let client = test_client("https://ssapi.shipstation.com");
        let url = client.build_url("orders/42", &[]);
        assert_eq!(url.as_str(), "https://ssapi.shipstation.com/orders/42");
    }

    #[test]
    fn build_url_appends_query_params() {
        let client = test_client("https://ssapi.shipstation.com/");
        let url = client.build_url("shipments", &[("orderId", "7"), ("page", "2")]);
        assert_eq!(
            url.as_str(),
            "https://ssapi.shipstation.com/shipments?orderId=7&page=2"
        );
    }

    #[test]
    fn build_url_encodes_special_characters() {
        let client = test_client("https://ssapi.shipstation.com");
        let url = client.build_url("orders", &[("createDateStart", "2026-03-01 00:00:00")]);
        assert!(
            url.as_str().contains("2026-03-01+00%3A00%3A00")
                || url.as_str().contains("2026-03-01%2000%3A00%3A00"),
            "date param should be percent-encoded: {url}"
        );
    }
}
