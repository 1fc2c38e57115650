use crate::catalog::{COMMON_SERVICES, COMMON_SERVICE_SYNONYMS, ECUADOR_CITY_SYNONYMS};
use crate::normalize::{contains_term, normalize_for_matching};

/// Static `(service, city)` extraction over the conversation history plus
/// the latest message. Synonym tables first, exact service names second,
/// first match wins. Either side may come back empty.
pub fn extract_service_and_city(
    history: &str,
    last_message: &str,
) -> (Option<String>, Option<String>) {
    let combined = format!("{}\n{}", history, last_message);
    let normalized = normalize_for_matching(&combined);
    if normalized.is_empty() {
        return (None, None);
    }

    let mut service = None;
    'service: for (canonical, synonyms) in COMMON_SERVICE_SYNONYMS {
        for synonym in *synonyms {
            if contains_term(&normalized, synonym) {
                service = Some(canonical.to_string());
                break 'service;
            }
        }
    }
    if service.is_none() {
        for candidate in COMMON_SERVICES {
            if contains_term(&normalized, &normalize_for_matching(candidate)) {
                service = Some(candidate.to_string());
                break;
            }
        }
    }

    let mut city = None;
    'city: for (canonical, synonyms) in ECUADOR_CITY_SYNONYMS {
        if contains_term(&normalized, &normalize_for_matching(canonical)) {
            city = Some(canonical.to_string());
            break;
        }
        for synonym in *synonyms {
            if contains_term(&normalized, synonym) {
                city = Some(canonical.to_string());
                break 'city;
            }
        }
    }

    (service, city)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_both_from_one_message() {
        let (service, city) = extract_service_and_city("", "necesito un plomero en Quito");
        assert_eq!(service.as_deref(), Some("plomero"));
        assert_eq!(city.as_deref(), Some("Quito"));
    }

    #[test]
    fn synonym_beats_exact_name_scan() {
        let (service, _) = extract_service_and_city("", "se me daño la tubería, hay fuga de agua");
        assert_eq!(service.as_deref(), Some("plomero"));
    }

    #[test]
    fn city_typo_synonym_resolves() {
        let (service, city) = extract_service_and_city("", "plomero en cueca");
        assert_eq!(service.as_deref(), Some("plomero"));
        assert_eq!(city.as_deref(), Some("Cuenca"));
    }

    #[test]
    fn uses_history_context() {
        let (service, city) =
            extract_service_and_city("Usuario: busco electricista", "en Guayaquil");
        assert_eq!(service.as_deref(), Some("electricista"));
        assert_eq!(city.as_deref(), Some("Guayaquil"));
    }

    #[test]
    fn nothing_found() {
        let (service, city) = extract_service_and_city("", "hola, ¿cómo estás?");
        assert!(service.is_none());
        assert!(city.is_none());
    }

    #[test]
    fn multi_word_service_detected() {
        let (service, _) = extract_service_and_city("", "busco un gestor de redes sociales");
        assert_eq!(service.as_deref(), Some("community manager"));
    }
}
