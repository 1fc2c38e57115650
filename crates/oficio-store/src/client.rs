use std::time::{Duration, Instant};

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use oficio_core::config::StoreConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Queries slower than this are logged (but not failed).
const SLOW_QUERY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("relational store not configured")]
    Unconfigured,

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("row failed to decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Thin PostgREST client: select / insert / patch against
/// `{base}/rest/v1/{table}`, authenticated with the service key.
#[derive(Clone)]
pub struct StoreClient {
    http: reqwest::Client,
    base_url: Option<String>,
    service_key: Option<String>,
}

impl StoreClient {
    pub fn new(cfg: &StoreConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: cfg
                .supabase_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
            service_key: cfg.supabase_service_key.clone(),
        }
    }

    pub fn configured(&self) -> bool {
        self.base_url.is_some() && self.service_key.is_some()
    }

    /// `GET /rest/v1/{table}?{filter}&select=*` → rows.
    pub async fn select(&self, table: &str, filter: &str) -> Result<Vec<Value>, StoreError> {
        let url = format!("{}?{}&select=*", self.table_url(table)?, filter);
        self.rows(table, self.authed(Method::GET, &url)?).await
    }

    /// `POST /rest/v1/{table}` returning the inserted rows.
    pub async fn insert<T: Serialize>(
        &self,
        table: &str,
        body: &T,
    ) -> Result<Vec<Value>, StoreError> {
        let url = self.table_url(table)?;
        let req = self
            .authed(Method::POST, &url)?
            .header("prefer", "return=representation")
            .json(body);
        self.rows(table, req).await
    }

    /// `PATCH /rest/v1/{table}?{filter}` returning the updated rows.
    pub async fn patch<T: Serialize>(
        &self,
        table: &str,
        filter: &str,
        body: &T,
    ) -> Result<Vec<Value>, StoreError> {
        let url = format!("{}?{}", self.table_url(table)?, filter);
        let req = self
            .authed(Method::PATCH, &url)?
            .header("prefer", "return=representation")
            .json(body);
        self.rows(table, req).await
    }

    fn table_url(&self, table: &str) -> Result<String, StoreError> {
        let base = self.base_url.as_deref().ok_or(StoreError::Unconfigured)?;
        Ok(format!("{}/rest/v1/{}", base, table))
    }

    fn authed(&self, method: Method, url: &str) -> Result<reqwest::RequestBuilder, StoreError> {
        let key = self.service_key.as_deref().ok_or(StoreError::Unconfigured)?;
        Ok(self
            .http
            .request(method, url)
            .timeout(REQUEST_TIMEOUT)
            .header("apikey", key)
            .bearer_auth(key))
    }

    async fn rows(
        &self,
        table: &str,
        req: reqwest::RequestBuilder,
    ) -> Result<Vec<Value>, StoreError> {
        let started = Instant::now();
        let resp = req.send().await?;
        let elapsed = started.elapsed();
        if elapsed > SLOW_QUERY {
            warn!(table, elapsed_ms = elapsed.as_millis() as u64, "slow store query");
        }
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(StoreError::Backend { status, message });
        }
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_store_errors_cleanly() {
        let client = StoreClient::new(&StoreConfig::default());
        assert!(!client.configured());
        let err = client.select("customers", "phone=eq.593").await.unwrap_err();
        assert!(matches!(err, StoreError::Unconfigured));
    }
}
