//! C11: the consent gate. Holds the conversation until the user explicitly
//! accepts or declines data sharing; every decision is recorded with the
//! full message metadata.

use serde_json::{Map, Value};
use tracing::{info, warn};

use oficio_core::types::{CustomerProfile, Reply, ReplySet, WhatsAppInbound};
use oficio_nlp::{interpret_yes_no, normalize_button};
use oficio_store::{ConsentRepo, ConsentResponse};

use crate::directory::CustomerDirectory;
use crate::messages;

/// What one pass through the gate produced.
pub struct ConsentOutcome {
    pub reply: ReplySet,
    /// Set when the user actually decided this turn.
    pub decision: Option<ConsentResponse>,
}

#[derive(Clone)]
pub struct ConsentService {
    consents: ConsentRepo,
}

impl ConsentService {
    pub fn new(consents: ConsentRepo) -> Self {
        Self { consents }
    }

    /// The two consent prompt messages (intro + question with buttons).
    pub fn prompt() -> ReplySet {
        ReplySet::messages(vec![
            Reply::text(messages::CONSENT_INTRO),
            Reply::buttons(
                messages::CONSENT_PROMPT,
                vec![
                    messages::CONSENT_ACCEPT_LABEL.to_string(),
                    messages::CONSENT_DECLINE_LABEL.to_string(),
                ],
            ),
        ])
    }

    /// Handle one inbound message from a customer without consent.
    ///
    /// Interprets buttons, bare numbers, and yes/no phrasing; anything else
    /// re-sends the prompt. Idempotent: a repeated "1" after acceptance is
    /// absorbed upstream because the profile then carries `has_consent`.
    pub async fn handle(
        &self,
        directory: &CustomerDirectory,
        customer: &CustomerProfile,
        payload: &WhatsAppInbound,
    ) -> ConsentOutcome {
        let Some(decision) = Self::interpret(payload) else {
            return ConsentOutcome {
                reply: Self::prompt(),
                decision: None,
            };
        };

        self.record(customer, payload, decision).await;

        let reply = match decision {
            ConsentResponse::Accepted => {
                info!(phone = %customer.phone, "consent accepted");
                directory.mark_consented(customer).await;
                ReplySet::single(Reply::text(messages::INITIAL_SERVICE_PROMPT))
            }
            ConsentResponse::Declined => {
                info!(phone = %customer.phone, "consent declined");
                ReplySet::single(Reply::text(messages::CONSENT_DECLINED))
            }
        };
        ConsentOutcome {
            reply,
            decision: Some(decision),
        }
    }

    /// Button first, then numeric text, then free-form yes/no.
    fn interpret(payload: &WhatsAppInbound) -> Option<ConsentResponse> {
        let selected = normalize_button(payload.selected_option.as_deref());
        if let Some(selected) = selected {
            match selected.as_str() {
                "1" => return Some(ConsentResponse::Accepted),
                "2" => return Some(ConsentResponse::Declined),
                label if label.eq_ignore_ascii_case(messages::CONSENT_ACCEPT_LABEL) => {
                    return Some(ConsentResponse::Accepted)
                }
                label if label.eq_ignore_ascii_case(messages::CONSENT_DECLINE_LABEL) => {
                    return Some(ConsentResponse::Declined)
                }
                _ => {}
            }
        }
        match interpret_yes_no(payload.text()) {
            Some(true) => Some(ConsentResponse::Accepted),
            Some(false) => Some(ConsentResponse::Declined),
            None => None,
        }
    }

    async fn record(
        &self,
        customer: &CustomerProfile,
        payload: &WhatsAppInbound,
        decision: ConsentResponse,
    ) {
        let Some(user_id) = customer.id.as_deref() else {
            // Local profile (store unconfigured): nothing to attach the
            // legal record to.
            return;
        };
        let mut data = Map::new();
        data.insert("consent_timestamp".into(), payload.timestamp.clone().unwrap_or(Value::Null));
        data.insert("phone".into(), Value::String(payload.from_number.clone()));
        data.insert(
            "message_id".into(),
            payload.id.clone().map(Value::String).unwrap_or(Value::Null),
        );
        data.insert("exact_response".into(), Value::String(payload.text().to_string()));
        data.insert("consent_type".into(), Value::String("provider_contact".into()));
        data.insert("platform".into(), Value::String("whatsapp".into()));
        data.insert(
            "message_type".into(),
            payload.message_type.clone().map(Value::String).unwrap_or(Value::Null),
        );
        data.insert(
            "device_type".into(),
            payload.device_type.clone().map(Value::String).unwrap_or(Value::Null),
        );
        if let Err(e) = self.consents.record(user_id, decision, data).await {
            warn!(user_id, error = %e, "consent record not persisted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(content: &str, selected: Option<&str>) -> WhatsAppInbound {
        WhatsAppInbound {
            from_number: "593999111222".into(),
            content: Some(content.to_string()),
            selected_option: selected.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn button_one_accepts() {
        assert_eq!(
            ConsentService::interpret(&payload("", Some("1"))),
            Some(ConsentResponse::Accepted)
        );
        assert_eq!(
            ConsentService::interpret(&payload("", Some("1. Acepto"))),
            Some(ConsentResponse::Accepted)
        );
    }

    #[test]
    fn label_match_is_case_insensitive() {
        assert_eq!(
            ConsentService::interpret(&payload("", Some("acepto"))),
            Some(ConsentResponse::Accepted)
        );
        assert_eq!(
            ConsentService::interpret(&payload("", Some("No acepto"))),
            Some(ConsentResponse::Declined)
        );
    }

    #[test]
    fn free_text_yes_no() {
        assert_eq!(
            ConsentService::interpret(&payload("sí, de acuerdo", None)),
            Some(ConsentResponse::Accepted)
        );
        assert_eq!(
            ConsentService::interpret(&payload("no gracias", None)),
            Some(ConsentResponse::Declined)
        );
    }

    #[test]
    fn uninterpretable_input_reprompts() {
        assert_eq!(ConsentService::interpret(&payload("¿qué es esto?", None)), None);
        let prompt = ConsentService::prompt();
        assert_eq!(prompt.texts().len(), 2);
    }
}
