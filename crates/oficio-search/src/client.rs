use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use oficio_core::types::ProviderRecord;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search backend not configured")]
    Unconfigured,

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },
}

/// What a search produced. Providers pass through untouched — relevance
/// filtering belongs to the AI validator, willingness to the availability
/// probe.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchOutcome {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub providers: Vec<ProviderRecord>,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub search_metadata: Map<String, Value>,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    city: &'a str,
    limit: usize,
    mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expanded_terms: Option<&'a [String]>,
}

/// C7: token-based query against the search backend, filtered by city.
#[derive(Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl SearchClient {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    /// Search for `query` in `city`, optionally broadened with the expanded
    /// term list. Token mode is the fast path; `use_ai_enhancement` opts
    /// into the backend's own re-ranking (this pipeline normally does its
    /// own validation instead).
    pub async fn search(
        &self,
        query: &str,
        city: &str,
        limit: usize,
        use_ai_enhancement: bool,
        expanded_terms: Option<&[String]>,
    ) -> Result<SearchOutcome, SearchError> {
        let base = self.base_url.as_deref().ok_or(SearchError::Unconfigured)?;
        let url = format!("{}/search", base);
        let body = SearchRequest {
            query,
            city,
            limit,
            mode: if use_ai_enhancement { "ai" } else { "token" },
            expanded_terms,
        };

        debug!(query, city, limit, "searching providers");

        let resp = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status, "search backend error");
            return Err(SearchError::Backend { status, message });
        }

        let mut outcome: SearchOutcome = resp.json().await?;
        if outcome.total == 0 {
            outcome.total = outcome.providers.len();
        }
        debug!(found = outcome.providers.len(), "search complete");
        Ok(outcome)
    }
}
