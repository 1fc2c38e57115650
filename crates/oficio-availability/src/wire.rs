//! MQTT wire format. Field names are the protocol — the provider-side
//! agents speak Spanish keys, and responses arrive with either `estado` or
//! `status` and a handful of id/phone spellings.

use serde::{Deserialize, Serialize};

/// Strip the WhatsApp suffix and formatting noise so phones compare equal
/// across senders: `+593 99 111@c.us` → `59399111`.
pub fn normalize_phone(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    let raw = raw.strip_suffix("@c.us").unwrap_or(raw);
    let normalized: String = raw.chars().filter(|c| *c != '+' && *c != ' ').collect();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// One provider included in an availability request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
}

/// Request published to `MQTT_TEMA_SOLICITUD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPayload {
    pub req_id: String,
    #[serde(rename = "servicio")]
    pub service: String,
    #[serde(rename = "ciudad")]
    pub city: String,
    #[serde(rename = "candidatos")]
    pub candidates: Vec<Candidate>,
    #[serde(rename = "tiempo_espera_segundos")]
    pub wait_seconds: u64,
}

/// Response consumed from `MQTT_TEMA_RESPUESTA`. Lenient on purpose —
/// provider agents disagree on key spellings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsePayload {
    #[serde(default, alias = "request_id")]
    pub req_id: Option<String>,
    #[serde(default, alias = "id", alias = "proveedor_id")]
    pub provider_id: Option<String>,
    #[serde(default, alias = "phone", alias = "provider_number")]
    pub provider_phone: Option<String>,
    #[serde(default)]
    pub estado: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ResponsePayload {
    pub fn status_label(&self) -> String {
        self.estado
            .as_deref()
            .or(self.status.as_deref())
            .unwrap_or("")
            .trim()
            .to_lowercase()
    }
}

/// How a response counts toward the gather.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Accepted,
    Declined,
    /// Unrecognized vocabulary: stored nowhere.
    Unknown,
}

const ACCEPTED_LABELS: &[&str] = &["accepted", "yes", "si", "1", "disponible", "available"];
const DECLINED_LABELS: &[&str] = &["declined", "no", "0", "not_available", "ocupado"];

pub fn classify_status(label: &str) -> Disposition {
    if ACCEPTED_LABELS.contains(&label) {
        Disposition::Accepted
    } else if DECLINED_LABELS.contains(&label) {
        Disposition::Declined
    } else {
        Disposition::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_normalization() {
        assert_eq!(
            normalize_phone(Some("+593 99 111 2222@c.us")),
            Some("593991112222".to_string())
        );
        assert_eq!(normalize_phone(Some("  ")), None);
        assert_eq!(normalize_phone(None), None);
        assert_eq!(normalize_phone(Some("0991234567")), Some("0991234567".to_string()));
    }

    #[test]
    fn status_vocabulary() {
        for label in ["accepted", "yes", "si", "1", "disponible", "available"] {
            assert_eq!(classify_status(label), Disposition::Accepted, "{label}");
        }
        for label in ["declined", "no", "0", "not_available", "ocupado"] {
            assert_eq!(classify_status(label), Disposition::Declined, "{label}");
        }
        assert_eq!(classify_status("tal vez"), Disposition::Unknown);
        assert_eq!(classify_status(""), Disposition::Unknown);
    }

    #[test]
    fn response_prefers_estado_over_status() {
        let payload = ResponsePayload {
            estado: Some(" Disponible ".into()),
            status: Some("declined".into()),
            ..Default::default()
        };
        assert_eq!(payload.status_label(), "disponible");
    }
}
