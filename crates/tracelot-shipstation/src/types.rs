//! `ShipStation` API response types.
//!
//! All types model the JSON structures returned by the `ShipStation` REST
//! API (`camelCase` field names on the wire). Only the fields the sync
//! pipeline consumes are modeled; everything else is ignored on
//! deserialization.

use serde::{Deserialize, Deserializer};

/// One page of the `GET /orders` listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersPage {
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub pages: i64,
}

/// An order as returned by `GET /orders` (summary) or `GET /orders/{id}`
/// (full detail, including `internalNotes` and `advancedOptions`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: i64,
    pub order_number: String,
    #[serde(default)]
    pub order_date: Option<String>,
    #[serde(default)]
    pub order_status: Option<String>,
    #[serde(default)]
    pub ship_to: Option<ShipTo>,
    #[serde(default)]
    pub internal_notes: Option<String>,
    /// `ShipStation` occasionally returns this field as a non-object value
    /// on malformed orders; those decode to `None` rather than failing the
    /// whole order payload.
    #[serde(default, deserialize_with = "lenient_advanced_options")]
    pub advanced_options: Option<AdvancedOptions>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Returns `true` when the order status flag says the order shipped.
    #[must_use]
    pub fn is_shipped(&self) -> bool {
        self.order_status.as_deref() == Some("shipped")
    }
}

/// Ship-to address block on an order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipTo {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub street1: Option<String>,
    #[serde(default)]
    pub street2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

/// The two operator-managed custom fields carried on an order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedOptions {
    #[serde(default)]
    pub custom_field1: Option<String>,
    #[serde(default)]
    pub custom_field2: Option<String>,
}

/// A line item on an order or shipment. Shipment item payloads omit
/// `weight`; it decodes to `None` there.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub weight: Option<ItemWeight>,
}

/// Item weight block; only `value` is consumed.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemWeight {
    pub value: f64,
}

/// One page of the `GET /shipments?orderId=…` listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentsPage {
    #[serde(default)]
    pub shipments: Vec<Shipment>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub pages: i64,
}

/// A shipment row. `shipment_id` is absent on some voided/legacy rows; the
/// sync layer synthesizes a fallback identity in that case.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    #[serde(default)]
    pub shipment_id: Option<i64>,
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub ship_date: Option<String>,
    #[serde(default)]
    pub shipment_items: Option<Vec<OrderItem>>,
}

/// Decodes `advancedOptions` tolerantly: a non-object value (seen in the
/// wild on hand-edited orders) logs a warning and decodes to `None` instead
/// of failing the whole order.
fn lenient_advanced_options<'de, D>(deserializer: D) -> Result<Option<AdvancedOptions>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value::<AdvancedOptions>(value) {
        Ok(options) => Ok(Some(options)),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed advancedOptions payload");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_decodes_with_all_consumed_fields() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "orderId": 1001,
            "orderNumber": "SO-1001",
            "orderDate": "2026-03-02T09:15:00.0000000",
            "orderStatus": "shipped",
            "shipTo": {
                "company": "Mercy Hosp",
                "name": "Receiving",
                "street1": "1 Main St",
                "city": "Columbia",
                "state": "SC",
                "postalCode": "29201"
            },
            "internalNotes": "LOT: ABC12345",
            "advancedOptions": { "customField1": "SKU:211410SPT LOT:SLQ-1" },
            "items": [
                { "sku": "X-14", "name": "10-Pack", "quantity": 2, "weight": { "value": 20.0 } }
            ]
        }))
        .expect("order should decode");

        assert_eq!(order.order_id, 1001);
        assert!(order.is_shipped());
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 2);
        assert!((order.items[0].weight.unwrap().value - 20.0).abs() < f64::EPSILON);
        assert_eq!(
            order
                .advanced_options
                .as_ref()
                .and_then(|o| o.custom_field1.as_deref()),
            Some("SKU:211410SPT LOT:SLQ-1")
        );
    }

    #[test]
    fn order_decodes_with_minimal_fields() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "orderId": 7,
            "orderNumber": "SO-7"
        }))
        .expect("minimal order should decode");
        assert!(order.items.is_empty());
        assert!(order.ship_to.is_none());
        assert!(!order.is_shipped());
    }

    #[test]
    fn malformed_advanced_options_decodes_to_none() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "orderId": 8,
            "orderNumber": "SO-8",
            "advancedOptions": "not-an-object"
        }))
        .expect("order should decode despite bad advancedOptions");
        assert!(order.advanced_options.is_none());
    }

    #[test]
    fn shipment_tolerates_missing_shipment_id_and_items() {
        let shipment: Shipment = serde_json::from_value(serde_json::json!({
            "trackingNumber": "1Z999",
            "shipDate": "2026-03-03"
        }))
        .expect("shipment should decode");
        assert!(shipment.shipment_id.is_none());
        assert!(shipment.shipment_items.is_none());
    }
}
