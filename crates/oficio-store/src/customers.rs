use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};

use oficio_core::types::CustomerProfile;

use crate::client::{StoreClient, StoreError};

/// Customers table access. Rows are decoded into [`CustomerProfile`];
/// unknown columns are dropped.
#[derive(Clone)]
pub struct CustomerRepo {
    client: StoreClient,
}

impl CustomerRepo {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    pub fn configured(&self) -> bool {
        self.client.configured()
    }

    pub async fn get_by_phone(&self, phone: &str) -> Result<Option<CustomerProfile>, StoreError> {
        let rows = self
            .client
            .select("customers", &format!("phone=eq.{}", phone))
            .await?;
        decode_first(rows)
    }

    /// Existing row, or a freshly inserted one on first contact.
    pub async fn get_or_create(&self, phone: &str) -> Result<CustomerProfile, StoreError> {
        if let Some(existing) = self.get_by_phone(phone).await? {
            return Ok(existing);
        }
        debug!(phone, "creating customer on first contact");
        let rows = self
            .client
            .insert(
                "customers",
                &json!({
                    "phone": phone,
                    "has_consent": false,
                    "created_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        decode_first(rows)?.ok_or(StoreError::Backend {
            status: 200,
            message: "insert returned no representation".into(),
        })
    }

    /// Confirm a city on the customer; stamps `city_confirmed_at`.
    pub async fn update_city(
        &self,
        customer_id: &str,
        city: &str,
    ) -> Result<Option<CustomerProfile>, StoreError> {
        let rows = self
            .client
            .patch(
                "customers",
                &format!("id=eq.{}", customer_id),
                &json!({
                    "city": city,
                    "city_confirmed_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        info!(customer_id, city, "customer city confirmed");
        decode_first(rows)
    }

    pub async fn clear_city(&self, customer_id: &str) -> Result<(), StoreError> {
        self.client
            .patch(
                "customers",
                &format!("id=eq.{}", customer_id),
                &json!({ "city": Value::Null, "city_confirmed_at": Value::Null }),
            )
            .await?;
        Ok(())
    }

    pub async fn set_consent(&self, customer_id: &str, has_consent: bool) -> Result<(), StoreError> {
        self.client
            .patch(
                "customers",
                &format!("id=eq.{}", customer_id),
                &json!({ "has_consent": has_consent }),
            )
            .await?;
        Ok(())
    }

    pub async fn clear_consent(&self, customer_id: &str) -> Result<(), StoreError> {
        self.set_consent(customer_id, false).await
    }
}

fn decode_first(rows: Vec<Value>) -> Result<Option<CustomerProfile>, StoreError> {
    match rows.into_iter().next() {
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_decodes_from_store_row() {
        let row = json!({
            "id": "c-1",
            "phone": "593999111222",
            "full_name": "Ana Pérez",
            "city": "Quito",
            "city_confirmed_at": "2026-01-01T00:00:00Z",
            "has_consent": true,
            "created_at": "2025-12-01T00:00:00Z"
        });
        let profile = decode_first(vec![row]).unwrap().unwrap();
        assert_eq!(profile.id.as_deref(), Some("c-1"));
        assert_eq!(profile.city.as_deref(), Some("Quito"));
        assert!(profile.has_consent);
    }

    #[test]
    fn empty_result_is_none() {
        assert!(decode_first(vec![]).unwrap().is_none());
    }
}
