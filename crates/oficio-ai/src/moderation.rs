use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use oficio_kv::{keys, KvClient};

use crate::model::{ChatModel, ChatRequest};

/// Strikes before a ban is issued.
const MAX_WARNINGS: u32 = 3;

/// Ban horizon, and the lifetime of the strike counter.
const BAN_HOURS: i64 = 24;

/// Moderation verdict for one inbound text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Legitimate request — continue processing.
    Valid,
    /// Meaningless input. Gets a friendly error, never a strike.
    Nonsense,
    /// Policy violation. `warnings` is the count after this strike;
    /// `banned` when this strike crossed the threshold.
    Illegal { warnings: u32, banned: bool },
}

/// C6: multi-strike LLM-gated policy check with per-phone counters.
///
/// The classifier failing (timeout, parse, no model) fails open: user input
/// must never be blocked by our own infrastructure.
#[derive(Clone)]
pub struct ContentModerator {
    model: Option<Arc<dyn ChatModel>>,
    kv: KvClient,
}

impl ContentModerator {
    pub fn new(model: Option<Arc<dyn ChatModel>>, kv: KvClient) -> Self {
        Self { model, kv }
    }

    /// True while `ban:{phone}` holds a future `banned_until`.
    pub async fn is_banned(&self, phone: &str) -> bool {
        match self.kv.get_json::<DateTime<Utc>>(&keys::ban(phone)).await {
            Some(until) => until > Utc::now(),
            None => false,
        }
    }

    pub async fn validate(&self, text: &str, phone: &str) -> Verdict {
        let Some(model) = &self.model else {
            return Verdict::Valid;
        };
        let label = match self.classify(model.as_ref(), text).await {
            Some(label) => label,
            None => return Verdict::Valid,
        };
        match label.as_str() {
            "nonsense" => Verdict::Nonsense,
            "illegal" => self.record_strike(phone).await,
            _ => Verdict::Valid,
        }
    }

    async fn classify(&self, model: &dyn ChatModel, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let req = ChatRequest {
            system: "Eres un moderador de contenido para un servicio de búsqueda de \
                     profesionales (plomeros, abogados, electricistas, etc.).\n\n\
                     Clasifica el mensaje del usuario en UNA de estas categorías:\n\
                     - \"valid\": una solicitud legítima de servicio, aunque esté mal escrita\n\
                     - \"nonsense\": texto sin sentido o aleatorio que no describe ninguna necesidad\n\
                     - \"illegal\": solicita actividades ilegales, dañinas o claramente abusivas\n\n\
                     Ante la duda responde \"valid\". Responde SOLO con la palabra de la categoría."
                .to_string(),
            user: text.chars().take(300).collect(),
            temperature: 0.0,
            max_tokens: 5,
        };
        match model.complete(req).await {
            Ok(raw) => {
                let label = raw.trim().trim_matches('"').to_lowercase();
                match label.as_str() {
                    "valid" | "nonsense" | "illegal" => Some(label),
                    other => {
                        warn!(label = other, "unrecognized moderation label, failing open");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "moderation classify failed, failing open");
                None
            }
        }
    }

    /// Bump `warnings:{phone}`; on the third strike write `ban:{phone}`.
    async fn record_strike(&self, phone: &str) -> Verdict {
        let warnings = self
            .kv
            .get_json::<u32>(&keys::warnings(phone))
            .await
            .unwrap_or(0)
            + 1;
        let ttl = Duration::from_secs((BAN_HOURS * 3600) as u64);
        self.kv
            .set_json(&keys::warnings(phone), &warnings, Some(ttl))
            .await;

        if warnings >= MAX_WARNINGS {
            let banned_until = Utc::now() + chrono::Duration::hours(BAN_HOURS);
            self.kv
                .set_json(&keys::ban(phone), &banned_until, Some(ttl))
                .await;
            info!(phone, %banned_until, "user banned after repeated violations");
            return Verdict::Illegal {
                warnings,
                banned: true,
            };
        }
        info!(phone, warnings, "illegal content warning recorded");
        Verdict::Illegal {
            warnings,
            banned: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use async_trait::async_trait;

    /// Model that always answers with the same label.
    struct Fixed(&'static str);

    #[async_trait]
    impl ChatModel for Fixed {
        async fn complete(&self, _req: ChatRequest) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl ChatModel for Failing {
        async fn complete(&self, _req: ChatRequest) -> Result<String, LlmError> {
            Err(LlmError::Timeout)
        }
    }

    fn moderator(model: Arc<dyn ChatModel>) -> ContentModerator {
        ContentModerator::new(Some(model), KvClient::detached())
    }

    #[tokio::test]
    async fn valid_text_passes() {
        let m = moderator(Arc::new(Fixed("valid")));
        assert_eq!(m.validate("necesito un plomero", "p").await, Verdict::Valid);
        assert!(!m.is_banned("p").await);
    }

    #[tokio::test]
    async fn nonsense_never_strikes() {
        let m = moderator(Arc::new(Fixed("nonsense")));
        for _ in 0..5 {
            assert_eq!(m.validate("asdf qwer", "p").await, Verdict::Nonsense);
        }
        assert!(!m.is_banned("p").await);
    }

    #[tokio::test]
    async fn third_strike_bans_for_a_day() {
        let m = moderator(Arc::new(Fixed("illegal")));
        assert_eq!(
            m.validate("x", "p").await,
            Verdict::Illegal { warnings: 1, banned: false }
        );
        assert_eq!(
            m.validate("x", "p").await,
            Verdict::Illegal { warnings: 2, banned: false }
        );
        assert_eq!(
            m.validate("x", "p").await,
            Verdict::Illegal { warnings: 3, banned: true }
        );
        assert!(m.is_banned("p").await);
        // Another phone is unaffected.
        assert!(!m.is_banned("q").await);
    }

    #[tokio::test]
    async fn classifier_failure_fails_open() {
        let m = moderator(Arc::new(Failing));
        assert_eq!(m.validate("whatever", "p").await, Verdict::Valid);
    }

    #[tokio::test]
    async fn no_model_fails_open() {
        let m = ContentModerator::new(None, KvClient::detached());
        assert_eq!(m.validate("whatever", "p").await, Verdict::Valid);
    }
}
