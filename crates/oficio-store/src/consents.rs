use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::client::{StoreClient, StoreError};

/// The two answers a consent prompt can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentResponse {
    Accepted,
    Declined,
}

/// Append-only legal record of consent decisions. Never updated, never
/// deleted — each decision is a new row with the full message metadata.
#[derive(Clone)]
pub struct ConsentRepo {
    client: StoreClient,
}

impl ConsentRepo {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    pub async fn record(
        &self,
        user_id: &str,
        response: ConsentResponse,
        consent_data: Map<String, Value>,
    ) -> Result<(), StoreError> {
        self.client
            .insert(
                "consents",
                &json!({
                    "user_id": user_id,
                    "user_type": "customer",
                    "response": response,
                    "consent_data": consent_data,
                }),
            )
            .await?;
        info!(user_id, ?response, "consent decision recorded");
        Ok(())
    }
}
