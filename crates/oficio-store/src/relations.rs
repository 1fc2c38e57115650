use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use crate::client::{StoreClient, StoreError};

/// Learned `user query → profession` relations. When the model (rather than
/// the synonym tables) inferred a service, the pairing is upserted here so
/// the catalog can be grown from real usage. Strictly best-effort.
#[derive(Clone)]
pub struct ServiceRelationRepo {
    client: StoreClient,
}

impl ServiceRelationRepo {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    /// Insert the relation or bump its usage counter. Failures are logged
    /// and swallowed — learning must never affect the conversation.
    pub async fn record_inference(
        &self,
        user_query: &str,
        inferred_profession: &str,
        search_terms: &[String],
    ) {
        if let Err(e) = self
            .record_inner(user_query, inferred_profession, search_terms)
            .await
        {
            warn!(error = %e, "service relation not recorded");
        }
    }

    async fn record_inner(
        &self,
        user_query: &str,
        inferred_profession: &str,
        search_terms: &[String],
    ) -> Result<(), StoreError> {
        let query_norm = user_query.trim().to_lowercase();
        let profession_norm = inferred_profession.trim().to_lowercase();
        let filter = format!(
            "user_query=eq.{}&inferred_profession=eq.{}",
            query_norm, profession_norm
        );
        let existing = self.client.select("service_relations", &filter).await?;

        if let Some(row) = existing.first() {
            let usage = row.get("usage_count").and_then(|v| v.as_u64()).unwrap_or(1);
            self.client
                .patch(
                    "service_relations",
                    &filter,
                    &json!({
                        "usage_count": usage + 1,
                        "updated_at": Utc::now().to_rfc3339(),
                    }),
                )
                .await?;
            debug!(query = %query_norm, usage = usage + 1, "service relation reinforced");
        } else {
            self.client
                .insert(
                    "service_relations",
                    &json!({
                        "user_query": query_norm,
                        "inferred_profession": profession_norm,
                        "search_terms": search_terms,
                        "confidence_score": 0.8,
                        "usage_count": 1,
                        "created_at": Utc::now().to_rfc3339(),
                        "updated_at": Utc::now().to_rfc3339(),
                    }),
                )
                .await?;
            debug!(query = %query_norm, "new service relation learned");
        }
        Ok(())
    }
}
