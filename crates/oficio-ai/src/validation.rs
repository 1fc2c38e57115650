use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use oficio_core::types::ProviderRecord;

use crate::model::{strip_code_fences, ChatModel, ChatRequest};

/// C8: post-search relevance filter.
///
/// Asks the model for a boolean per provider ("can this one actually serve
/// the need?") and keeps the `true`s. Fails open to the full list: dropping
/// a willing provider here is worse than passing an unwilling one, because
/// the availability probe downstream drops the unwilling anyway.
#[derive(Clone)]
pub struct ProviderValidator {
    model: Option<Arc<dyn ChatModel>>,
}

impl ProviderValidator {
    pub fn new(model: Option<Arc<dyn ChatModel>>) -> Self {
        Self { model }
    }

    pub async fn validate(
        &self,
        user_need: &str,
        providers: Vec<ProviderRecord>,
    ) -> Vec<ProviderRecord> {
        if providers.is_empty() {
            return providers;
        }
        let Some(model) = &self.model else {
            return providers;
        };

        let req = ChatRequest {
            system: "Eres un experto analista de servicios profesionales. Analizas si un \
                     proveedor tiene la capacidad real de ayudar con una necesidad específica \
                     basándote en su profesión y servicios."
                .to_string(),
            user: build_prompt(user_need, &providers),
            temperature: 0.3,
            max_tokens: 150,
        };

        let raw = match model.complete(req).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "provider validation failed, keeping all providers");
                return providers;
            }
        };

        let Some(flags) = parse_flags(&raw) else {
            warn!("provider validation response unusable, keeping all providers");
            return providers;
        };

        if flags.len() != providers.len() {
            warn!(
                expected = providers.len(),
                got = flags.len(),
                "validation array length mismatch, truncating to the shorter"
            );
        }

        let kept: Vec<ProviderRecord> = providers
            .into_iter()
            .zip(flags)
            .filter_map(|(provider, ok)| ok.then_some(provider))
            .collect();
        info!(kept = kept.len(), need = user_need, "AI validation complete");
        kept
    }
}

fn build_prompt(user_need: &str, providers: &[ProviderRecord]) -> String {
    let mut blocks = Vec::with_capacity(providers.len());
    for (i, p) in providers.iter().enumerate() {
        let profession = p.profession.as_deref().unwrap_or("N/A");
        let services = if p.services.is_empty() {
            "N/A".to_string()
        } else {
            p.services
                .iter()
                .take(5)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };
        let experience = p
            .years_of_experience
            .map(|y| y.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let rating = p
            .rating
            .map(|r| r.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        blocks.push(format!(
            "Proveedor {}:\n- Profesión: {}\n- Servicios: {}\n- Experiencia: {} años\n- Rating: {}",
            i + 1,
            profession,
            services,
            experience,
            rating
        ));
    }

    format!(
        "Tu tarea es analizar si cada proveedor PUEDE ayudar con esta necesidad del usuario.\n\n\
         IMPORTANTE: Los servicios pueden estar en español o inglés. Términos como \
         \"community manager\" o \"social media manager\" son EQUIVALENTES a \
         \"gestor de redes sociales\".\n\n\
         NECESIDAD DEL USUARIO: \"{}\"\n\n\
         {}\n\n\
         Para CADA proveedor, responde si PUEDE ayudar o NO:\n\
         1. La profesión debe ser APROPIADA para la necesidad\n\
         2. Los servicios deben ser RELEVANTES y APLICABLES (acepta equivalentes en inglés)\n\
         3. La experiencia debe ser APLICABLE a la necesidad\n\n\
         Responde SOLO con JSON (array de booleanos, en el mismo orden). \
         NO incluyas explicaciones.",
        user_need,
        blocks.join("\n\n")
    )
}

fn parse_flags(raw: &str) -> Option<Vec<bool>> {
    let parsed: Value = serde_json::from_str(strip_code_fences(raw)).ok()?;
    let Value::Array(items) = parsed else {
        return None;
    };
    if items.is_empty() {
        return None;
    }
    // Position matters: a non-boolean entry judges its provider as "no"
    // rather than shifting every later answer onto the wrong provider.
    Some(items.into_iter().map(|item| item.as_bool().unwrap_or(false)).collect())
}
