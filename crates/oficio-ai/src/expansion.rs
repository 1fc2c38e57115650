use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use oficio_nlp::catalog::ECUADOR_CITY_SYNONYMS;
use oficio_nlp::extract_service_and_city;

use crate::model::{strip_code_fences, ChatModel, ChatRequest};

/// How many expanded search terms to ask for.
const MAX_SYNONYMS: usize = 5;

/// Inputs get truncated before prompting to bound token spend.
const PROMPT_INPUT_CAP: usize = 200;

/// Result of need extraction: canonical service, canonical city, and the
/// LLM-expanded term list (always containing the service itself when set).
#[derive(Debug, Clone, Default)]
pub struct ExtractedNeed {
    pub service: Option<String>,
    pub city: Option<String>,
    pub expanded_terms: Option<Vec<String>>,
    /// True when the service came from the model, not the synonym tables.
    pub service_inferred: bool,
}

/// C5: static synonym-table extraction with optional LLM fallback and
/// expansion. Every model failure downgrades to the static result.
#[derive(Clone)]
pub struct NeedExtractor {
    model: Option<Arc<dyn ChatModel>>,
    use_expansion: bool,
}

impl NeedExtractor {
    pub fn new(model: Option<Arc<dyn ChatModel>>, use_expansion: bool) -> Self {
        Self { model, use_expansion }
    }

    /// Static-only extraction (no model involved).
    pub fn extract(&self, history: &str, last_message: &str) -> (Option<String>, Option<String>) {
        extract_service_and_city(history, last_message)
    }

    /// Full pipeline: static pass, then model fallbacks, then expansion.
    pub async fn extract_with_expansion(&self, history: &str, last_message: &str) -> ExtractedNeed {
        let (mut service, mut city) = self.extract(history, last_message);
        let mut service_inferred = false;

        if service.is_none() {
            if let Some(model) = &self.model {
                debug!("static extraction found no service, asking the model");
                service = self.infer_service(model.as_ref(), last_message).await;
                service_inferred = service.is_some();
                if city.is_none() {
                    city = self.infer_city(model.as_ref(), last_message).await;
                }
            }
        }

        let Some(service) = service else {
            return ExtractedNeed {
                service: None,
                city,
                expanded_terms: None,
                service_inferred: false,
            };
        };

        let expanded_terms = if self.use_expansion {
            match &self.model {
                Some(model) => Some(self.expand(model.as_ref(), &service).await),
                None => Some(vec![service.clone()]),
            }
        } else {
            Some(vec![service.clone()])
        };

        ExtractedNeed {
            service: Some(service),
            city,
            expanded_terms,
            service_inferred,
        }
    }

    /// Ask for the single canonical service term. Accepted only when
    /// non-empty and not the literal "null".
    async fn infer_service(&self, model: &dyn ChatModel, text: &str) -> Option<String> {
        let text = truncate(text);
        if text.is_empty() {
            return None;
        }
        let req = ChatRequest {
            system: "Eres un experto en identificar servicios profesionales. Tu tarea es \
                     extraer EL SERVICIO PRINCIPAL que el usuario necesita.\n\n\
                     Reglas:\n\
                     1. Responde SOLO con el nombre del servicio/profesión en español\n\
                     2. Si mencionan múltiples servicios, extrae el PRINCIPAL\n\
                     3. Usa términos estándar (ej: \"community manager\" en lugar de \"gestor de redes\")\n\
                     4. Si no está claro qué servicio necesitan, responde \"null\"\n\n\
                     Responde SOLO con el nombre del servicio, sin explicaciones."
                .to_string(),
            user: format!("¿Cuál es el servicio principal que necesita este usuario: \"{}\"?", text),
            temperature: 0.3,
            max_tokens: 50,
        };
        match model.complete(req).await {
            Ok(raw) => {
                let cleaned = raw.trim().trim_matches(['"', '\'']).trim().to_string();
                if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("null") {
                    return None;
                }
                info!(service = %cleaned, "model inferred service");
                Some(cleaned)
            }
            Err(e) => {
                warn!(error = %e, "service inference failed, keeping static result");
                None
            }
        }
    }

    /// Ask for a city, accepted only when it is one of the known canonicals.
    async fn infer_city(&self, model: &dyn ChatModel, text: &str) -> Option<String> {
        let text = truncate(text);
        if text.is_empty() {
            return None;
        }
        let cities: Vec<&str> = ECUADOR_CITY_SYNONYMS.iter().map(|(c, _)| *c).collect();
        let req = ChatRequest {
            system: format!(
                "Eres un experto en identificar ciudades de Ecuador. Tu tarea es extraer \
                 LA CIUDAD mencionada en el texto.\n\n\
                 Ciudades válidas: {}\n\n\
                 Reglas:\n\
                 1. Responde SOLO con el nombre de la ciudad si está en la lista\n\
                 2. Si no se menciona ninguna ciudad válida, responde \"null\"\n\
                 3. Normaliza el nombre (ej: \"quito\" → \"Quito\")\n\n\
                 Responde SOLO con el nombre de la ciudad o \"null\", sin explicaciones.",
                cities.join(", ")
            ),
            user: format!("¿Qué ciudad de Ecuador se menciona en: \"{}\"?", text),
            temperature: 0.3,
            max_tokens: 30,
        };
        match model.complete(req).await {
            Ok(raw) => {
                let cleaned = raw.trim().trim_matches(['"', '\'']).trim().to_string();
                if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("null") {
                    return None;
                }
                cities
                    .iter()
                    .find(|c| c.eq_ignore_ascii_case(&cleaned))
                    .map(|c| c.to_string())
            }
            Err(e) => {
                warn!(error = %e, "city inference failed");
                None
            }
        }
    }

    /// Expand the need into up to `MAX_SYNONYMS` equivalent search terms
    /// (Spanish and English). Any failure falls back to `[service]`.
    async fn expand(&self, model: &dyn ChatModel, service: &str) -> Vec<String> {
        let fallback = vec![service.to_string()];
        let need = truncate(service);
        if need.is_empty() {
            return fallback;
        }
        let req = ChatRequest {
            system: format!(
                "Eres un experto en servicios profesionales. Genera {MAX_SYNONYMS} términos de \
                 búsqueda que capturen:\n\
                 1. La profesión/servicio principal\n\
                 2. Sinónimos comunes en español\n\
                 3. Términos equivalentes en inglés si aplica\n\
                 4. Variedades relacionadas que usarían proveedores\n\n\
                 Ejemplos:\n\
                 - \"marketing\" → [\"marketing\", \"publicidad\", \"mercadotecnia\", \"marketing digital\", \"promoción\"]\n\
                 - \"gestor de redes sociales\" → [\"gestor de redes sociales\", \"community manager\", \"social media manager\", \"redes sociales\"]\n\n\
                 Responde SOLO con un JSON array de strings. Sin explicaciones."
            ),
            user: format!("Genera {MAX_SYNONYMS} sinónimos o términos equivalentes para: \"{need}\""),
            temperature: 0.5,
            max_tokens: 150,
        };
        let raw = match model.complete(req).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "expansion failed, using the service term alone");
                return fallback;
            }
        };
        let parsed: Value = match serde_json::from_str(strip_code_fences(&raw)) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "expansion response was not JSON");
                return fallback;
            }
        };
        let Value::Array(items) = parsed else {
            warn!("expansion response was not an array");
            return fallback;
        };
        let mut terms: Vec<String> = items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect();
        if terms.is_empty() {
            return fallback;
        }
        if !terms.iter().any(|t| t.eq_ignore_ascii_case(service)) {
            terms.insert(0, service.to_string());
        }
        terms.truncate(MAX_SYNONYMS);
        info!(service, terms = ?terms, "need expanded");
        terms
    }
}

fn truncate(text: &str) -> &str {
    let text = text.trim();
    match text.char_indices().nth(PROMPT_INPUT_CAP) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
