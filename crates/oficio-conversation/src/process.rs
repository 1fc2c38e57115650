//! The free-text `/process-message` surface: extract `(profession, city)`
//! from the message plus session context, search when both are present,
//! and answer with a provider digest or a guidance prompt.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use oficio_core::types::ProviderRecord;
use oficio_nlp::extract_service_and_city;

use crate::messages;
use crate::services::ConversationServices;

const DIGEST_LIMIT: usize = 3;

#[derive(Debug, Serialize)]
pub struct ProcessedMessage {
    pub response: String,
    pub intent: String,
    pub entities: Map<String, Value>,
    pub confidence: f64,
}

pub async fn process_free_message(
    services: &Arc<ConversationServices>,
    phone: &str,
    message: &str,
) -> ProcessedMessage {
    services
        .sessions
        .save(phone, message, false, Map::new())
        .await;

    let context = services.sessions.context(phone, 10).await;
    let (profession, city) = extract_service_and_city(&context, message);
    let intent = detect_intent(message);

    let mut entities = Map::new();
    entities.insert("profession".into(), opt_value(&profession));
    entities.insert("location".into(), opt_value(&city));

    let (response, confidence) = match (&profession, &city) {
        (Some(profession), Some(city)) => {
            match services.search.search(profession, city, DIGEST_LIMIT, false, None).await {
                Ok(outcome) if !outcome.providers.is_empty() => {
                    let providers: Vec<ProviderRecord> =
                        outcome.providers.into_iter().take(DIGEST_LIMIT).collect();
                    entities.insert(
                        "providers".into(),
                        serde_json::to_value(&providers).unwrap_or(Value::Null),
                    );
                    (digest(profession, city, &providers), 0.9)
                }
                Ok(_) => (messages::no_results(profession, city), 0.8),
                Err(e) => {
                    warn!(phone, error = %e, "digest search failed");
                    (messages::no_results(profession, city), 0.6)
                }
            }
        }
        (Some(_), None) => (messages::CITY_PROMPT.to_string(), 0.7),
        (None, _) => (messages::GUIDANCE_NO_SERVICE.to_string(), 0.5),
    };

    services.sessions.save(phone, &response, true, Map::new()).await;

    ProcessedMessage {
        response,
        intent,
        entities,
        confidence,
    }
}

fn digest(profession: &str, city: &str, providers: &[ProviderRecord]) -> String {
    let mut lines = vec![
        format!(
            "¡Excelente! He encontrado {} {} en {}:",
            providers.len(),
            profession,
            city
        ),
        String::new(),
    ];
    for (i, p) in providers.iter().enumerate() {
        let mut line = format!("{}. {}", i + 1, p.display_name());
        if let Some(rating) = p.rating {
            line.push_str(&format!(" ⭐{:.1}", rating));
        }
        lines.push(line);
        if let Some(phone) = &p.phone {
            lines.push(format!("   - Teléfono: {}", phone));
        }
        if let Some(years) = p.years_of_experience {
            lines.push(format!("   - Experiencia: {} años", years));
        }
    }
    lines.push(String::new());
    lines.push("¿Quieres que te comparta el contacto de alguno?".to_string());
    lines.join("\n")
}

fn detect_intent(message: &str) -> String {
    let lower = message.to_lowercase();
    if lower.contains("precio") || lower.contains("costo") {
        "pricing_inquiry".to_string()
    } else if lower.contains("disponible") {
        "availability_check".to_string()
    } else if lower.contains("necesito") || lower.contains("busco") {
        "service_request".to_string()
    } else {
        "information_request".to_string()
    }
}

fn opt_value(value: &Option<String>) -> Value {
    value
        .as_ref()
        .map(|v| Value::String(v.clone()))
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_detection() {
        assert_eq!(detect_intent("necesito un plomero"), "service_request");
        assert_eq!(detect_intent("¿cuál es el precio?"), "pricing_inquiry");
        assert_eq!(detect_intent("¿está disponible mañana?"), "availability_check");
        assert_eq!(detect_intent("hola"), "information_request");
    }

    #[test]
    fn digest_lists_providers_with_contact() {
        let providers = vec![ProviderRecord {
            name: Some("Ana".into()),
            phone: Some("099".into()),
            rating: Some(4.5),
            years_of_experience: Some(3),
            ..Default::default()
        }];
        let text = digest("plomero", "Quito", &providers);
        assert!(text.contains("1 plomero en Quito"));
        assert!(text.contains("1. Ana ⭐4.5"));
        assert!(text.contains("Teléfono: 099"));
        assert!(text.ends_with("¿Quieres que te comparta el contacto de alguno?"));
    }
}
