//! C14: the push half of outbound messaging. The reply path is just the
//! `ReplySet` returned to the wire adapter; this sender covers messages
//! emitted after the inbound request has already returned (the background
//! pipeline, provider notifications).

use std::time::Duration;

use serde_json::json;
use tracing::warn;

use oficio_sessions::SessionLog;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct WhatsAppSender {
    http: reqwest::Client,
    base_url: Option<String>,
    sessions: SessionLog,
}

impl WhatsAppSender {
    pub fn new(base_url: Option<String>, sessions: SessionLog) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
            sessions,
        }
    }

    /// Push one text via the WhatsApp adapter. Best-effort: a failed send
    /// is logged and reported as `false`, never an error.
    pub async fn send_text(&self, phone: &str, text: &str) -> bool {
        let Some(base) = self.base_url.as_deref() else {
            warn!(phone, "whatsapp adapter not configured; outbound message dropped");
            return false;
        };
        let url = format!("{}/send", base);
        let result = self
            .http
            .post(&url)
            .timeout(SEND_TIMEOUT)
            .json(&json!({ "to": phone, "message": text }))
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(phone, status = resp.status().as_u16(), "whatsapp send rejected");
                false
            }
            Err(e) => {
                warn!(phone, error = %e, "whatsapp send failed");
                false
            }
        }
    }

    /// Send to a customer and mirror the text into their session log.
    /// Used for every bot message on the push path; plain `send_text` is
    /// for out-of-band notices (e.g. pinging a provider) that do not
    /// belong to the customer transcript.
    pub async fn send_and_log(&self, phone: &str, text: &str) -> bool {
        self.sessions
            .save(phone, text, true, serde_json::Map::new())
            .await;
        self.send_text(phone, text).await
    }
}
