//! Customer/rep resolution capability, injected into the engine.
//!
//! The engine needs three operations against the CRM side of the schema:
//! resolve-or-create a customer from an order's ship-to block, pick the
//! responsible rep for that customer, and persist the rep assignment. They
//! are behind a trait so the engine can be exercised without a database and
//! so the CRM wiring stays a constructor-injected dependency rather than a
//! set of global callbacks.

use async_trait::async_trait;
use sqlx::PgPool;

use tracelot_core::normalize_company_key;
use tracelot_db::{CustomerRow, DbError, NewCustomer};
use tracelot_shipstation::ShipTo;

/// Ship-to fields the directory needs to resolve a customer.
#[derive(Debug, Clone)]
pub struct ShipToFields {
    pub facility_name: String,
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub company_key: String,
}

impl ShipToFields {
    /// Builds resolution fields from a vendor ship-to block. The facility
    /// name prefers the company line, falls back to the contact name, and
    /// bottoms out at a fixed placeholder so the company key is never empty.
    #[must_use]
    pub fn from_ship_to(ship_to: &ShipTo) -> Self {
        let facility_name = ship_to
            .company
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| ship_to.name.as_deref().filter(|s| !s.trim().is_empty()))
            .unwrap_or("UNKNOWN FACILITY")
            .trim()
            .to_owned();
        let company_key = normalize_company_key(&facility_name);
        Self {
            facility_name,
            street1: ship_to.street1.clone(),
            street2: ship_to.street2.clone(),
            city: ship_to.city.clone(),
            state: ship_to.state.clone(),
            postal_code: ship_to.postal_code.clone(),
            company_key,
        }
    }
}

/// The three CRM operations the engine consumes.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Finds the customer with the same company key or creates one.
    async fn resolve_or_create(&self, fields: &ShipToFields) -> Result<CustomerRow, DbError>;

    /// Picks the responsible rep for a customer: the primary assignment if
    /// one exists, otherwise the configured fallback.
    async fn pick_responsible_rep(
        &self,
        customer_id: i64,
        fallback_rep_id: Option<i64>,
    ) -> Result<Option<i64>, DbError>;

    /// Records the rep assignment; promoted to primary only when the
    /// customer has no assignment yet.
    async fn assign_rep(
        &self,
        customer_id: i64,
        rep_id: i64,
        make_primary_if_none: bool,
    ) -> Result<(), DbError>;
}

/// Postgres-backed [`CustomerDirectory`] over the CRM tables.
pub struct PgCustomerDirectory {
    pool: PgPool,
}

impl PgCustomerDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerDirectory for PgCustomerDirectory {
    async fn resolve_or_create(&self, fields: &ShipToFields) -> Result<CustomerRow, DbError> {
        if let Some(existing) =
            tracelot_db::find_customer_by_company_key(&self.pool, &fields.company_key).await?
        {
            return Ok(existing);
        }
        tracelot_db::insert_customer(
            &self.pool,
            &NewCustomer {
                facility_name: fields.facility_name.clone(),
                street1: fields.street1.clone(),
                street2: fields.street2.clone(),
                city: fields.city.clone(),
                state: fields.state.clone(),
                postal_code: fields.postal_code.clone(),
                company_key: fields.company_key.clone(),
            },
        )
        .await
    }

    async fn pick_responsible_rep(
        &self,
        customer_id: i64,
        fallback_rep_id: Option<i64>,
    ) -> Result<Option<i64>, DbError> {
        let primary = tracelot_db::find_primary_rep_id(&self.pool, customer_id).await?;
        Ok(primary.or(fallback_rep_id))
    }

    async fn assign_rep(
        &self,
        customer_id: i64,
        rep_id: i64,
        make_primary_if_none: bool,
    ) -> Result<(), DbError> {
        let make_primary = if make_primary_if_none {
            !tracelot_db::has_rep_assignment(&self.pool, customer_id).await?
        } else {
            false
        };
        tracelot_db::insert_rep_assignment(&self.pool, customer_id, rep_id, make_primary).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ship_to(company: Option<&str>, name: Option<&str>) -> ShipTo {
        ShipTo {
            company: company.map(str::to_owned),
            name: name.map(str::to_owned),
            street1: Some("1 Main St".to_owned()),
            street2: None,
            city: Some("Columbia".to_owned()),
            state: Some("SC".to_owned()),
            postal_code: Some("29201".to_owned()),
        }
    }

    #[test]
    fn facility_name_prefers_company_line() {
        let fields = ShipToFields::from_ship_to(&ship_to(Some("Mercy Hosp"), Some("Receiving")));
        assert_eq!(fields.facility_name, "Mercy Hosp");
        assert_eq!(fields.company_key, "MERCY HOSPITAL");
    }

    #[test]
    fn facility_name_falls_back_to_contact_name() {
        let fields = ShipToFields::from_ship_to(&ship_to(Some("  "), Some("Dr. Adams")));
        assert_eq!(fields.facility_name, "Dr. Adams");
    }

    #[test]
    fn facility_name_bottoms_out_at_placeholder() {
        let fields = ShipToFields::from_ship_to(&ship_to(None, None));
        assert_eq!(fields.facility_name, "UNKNOWN FACILITY");
        assert!(!fields.company_key.is_empty());
    }
}
