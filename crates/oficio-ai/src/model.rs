use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use oficio_core::config::LlmConfig;

use crate::error::LlmError;

/// One chat completion request. Single system + user turn is all this
/// service ever needs.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Seam between the LLM client and its consumers; tests swap in a stub.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, req: ChatRequest) -> Result<String, LlmError>;
}

/// OpenAI-compatible chat client. Every call holds a semaphore permit
/// (concurrency cap) and runs under the configured timeout.
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    semaphore: Arc<Semaphore>,
}

impl OpenAiChat {
    /// `None` when no API key is configured — callers then skip the model.
    pub fn from_config(cfg: &LlmConfig) -> Option<Arc<Self>> {
        let api_key = cfg.api_key.clone()?;
        Some(Arc::new(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            timeout: Duration::from_secs_f64(cfg.timeout_secs),
            semaphore: Arc::new(Semaphore::new(cfg.max_concurrency.max(1))),
        }))
    }

    async fn send(&self, req: &ChatRequest) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": req.system},
                {"role": "user", "content": req.user},
            ],
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
        });
        let url = format!("{}/v1/chat/completions", self.base_url);

        debug!(model = %self.model, "sending chat completion request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status, body = %message, "LLM API error");
            return Err(LlmError::Api { status, message });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        let content = api_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, req: ChatRequest) -> Result<String, LlmError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| LlmError::Timeout)?;
        match tokio::time::timeout(self.timeout, self.send(&req)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout),
        }
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Drop a wrapping ```…``` / ```json…``` fence if the model added one.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").or(inner.strip_prefix("JSON")).unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_stripping() {
        assert_eq!(strip_code_fences("```json\n[1,2]\n```"), "[1,2]");
        assert_eq!(strip_code_fences("```\ntrue\n```"), "true");
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[test]
    fn from_config_requires_api_key() {
        let cfg = LlmConfig::default();
        assert!(OpenAiChat::from_config(&cfg).is_none());
        let cfg = LlmConfig {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        assert!(OpenAiChat::from_config(&cfg).is_some());
    }
}
