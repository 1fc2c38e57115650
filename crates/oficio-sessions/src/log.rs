use std::time::Duration;

use chrono::{DateTime, Utc};
use oficio_kv::{keys, KvClient};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Hard cap on stored turns per phone; older turns drop on push.
pub const SESSION_CAP: usize = 20;

/// How long an idle transcript survives.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// One transcript entry, bot or user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTurn {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub is_bot: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub active_sessions: usize,
    pub total_turns: usize,
}

/// Capped per-phone transcript over the KV store. Writes are best-effort:
/// a failed append never fails the conversation turn that produced it.
#[derive(Clone)]
pub struct SessionLog {
    kv: KvClient,
}

impl SessionLog {
    pub fn new(kv: KvClient) -> Self {
        Self { kv }
    }

    pub async fn save(&self, phone: &str, message: &str, is_bot: bool, metadata: Map<String, Value>) {
        let turn = SessionTurn {
            message: message.to_string(),
            timestamp: Utc::now(),
            is_bot,
            metadata,
        };
        let raw = match serde_json::to_string(&turn) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(phone, error = %e, "session turn failed to encode");
                return;
            }
        };
        self.kv
            .list_push_capped(&keys::session(phone), raw, SESSION_CAP, SESSION_TTL)
            .await;
    }

    /// Most recent turns, oldest first (chronological for prompt building).
    pub async fn history(&self, phone: &str, limit: usize) -> Vec<SessionTurn> {
        let raw = self.kv.list_range(&keys::session(phone), limit).await;
        let mut turns: Vec<SessionTurn> = raw
            .iter()
            .filter_map(|item| serde_json::from_str(item).ok())
            .collect();
        turns.reverse();
        turns
    }

    /// Transcript rendered as `Usuario:`/`Bot:` lines for LLM context.
    pub async fn context(&self, phone: &str, limit: usize) -> String {
        self.history(phone, limit)
            .await
            .iter()
            .map(|turn| {
                let who = if turn.is_bot { "Bot" } else { "Usuario" };
                format!("{}: {}", who, turn.message)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn delete(&self, phone: &str) {
        self.kv.delete(&keys::session(phone)).await;
    }

    /// Counts over every stored transcript (prefix scan + per-key length).
    pub async fn stats(&self) -> SessionStats {
        let session_keys = self.kv.scan_prefix(keys::SESSION_PREFIX).await;
        let mut total_turns = 0;
        for key in &session_keys {
            total_turns += self.kv.list_len(key).await;
        }
        SessionStats {
            active_sessions: session_keys.len(),
            total_turns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_and_reads_in_chronological_order() {
        let log = SessionLog::new(KvClient::detached());
        log.save("p1", "hola", false, Map::new()).await;
        log.save("p1", "¿Qué servicio necesitas?", true, Map::new()).await;
        let history = log.history("p1", 10).await;
        assert_eq!(history.len(), 2);
        assert!(!history[0].is_bot);
        assert_eq!(history[1].message, "¿Qué servicio necesitas?");
    }

    #[tokio::test]
    async fn cap_drops_oldest() {
        let log = SessionLog::new(KvClient::detached());
        for i in 0..(SESSION_CAP + 5) {
            log.save("p1", &format!("m{}", i), false, Map::new()).await;
        }
        let history = log.history("p1", SESSION_CAP + 5).await;
        assert_eq!(history.len(), SESSION_CAP);
        assert_eq!(history[0].message, "m5");
    }

    #[tokio::test]
    async fn context_labels_speakers() {
        let log = SessionLog::new(KvClient::detached());
        log.save("p1", "busco plomero", false, Map::new()).await;
        log.save("p1", "¿En qué ciudad?", true, Map::new()).await;
        let ctx = log.context("p1", 10).await;
        assert_eq!(ctx, "Usuario: busco plomero\nBot: ¿En qué ciudad?");
    }

    #[tokio::test]
    async fn stats_count_sessions_and_turns() {
        let log = SessionLog::new(KvClient::detached());
        log.save("a", "x", false, Map::new()).await;
        log.save("b", "y", false, Map::new()).await;
        log.save("b", "z", true, Map::new()).await;
        let stats = log.stats().await;
        assert_eq!(stats.active_sessions, 2);
        assert_eq!(stats.total_turns, 3);
    }
}
