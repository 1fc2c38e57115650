use crate::catalog::{
    AFFIRMATIVE_WORDS, ECUADOR_CITY_SYNONYMS, GREETINGS, NEGATIVE_WORDS, RESET_KEYWORDS,
};
use crate::normalize::{contains_term, normalize_for_matching};

/// Resolve free text to a canonical city when any synonym (or the canonical
/// name itself) appears on a word boundary.
pub fn normalize_city_input(text: &str) -> Option<&'static str> {
    let normalized = normalize_for_matching(text);
    if normalized.is_empty() {
        return None;
    }
    for (canonical, synonyms) in ECUADOR_CITY_SYNONYMS {
        let canonical_norm = normalize_for_matching(canonical);
        if contains_term(&normalized, &canonical_norm) {
            return Some(canonical);
        }
        for synonym in *synonyms {
            if contains_term(&normalized, synonym) {
                return Some(canonical);
            }
        }
    }
    None
}

/// Token-level yes/no interpretation. A leading `1` / `2` overrides the
/// word lists; unrecognizable input is `None`.
pub fn interpret_yes_no(text: &str) -> Option<bool> {
    let trimmed = text.trim();
    match trimmed.chars().next() {
        Some('1') => return Some(true),
        Some('2') => return Some(false),
        _ => {}
    }
    let normalized = normalize_for_matching(trimmed);
    if normalized.is_empty() {
        return None;
    }
    // Negatives first: "no acepto" contains the affirmative "acepto".
    for word in NEGATIVE_WORDS {
        let w = normalize_for_matching(word);
        if normalized == w || contains_term(&normalized, &w) {
            return Some(false);
        }
    }
    for word in AFFIRMATIVE_WORDS {
        let w = normalize_for_matching(word);
        if normalized == w || contains_term(&normalized, &w) {
            return Some(true);
        }
    }
    None
}

pub fn is_greeting(text: &str) -> bool {
    let normalized = normalize_for_matching(text);
    GREETINGS.iter().any(|g| normalized == *g)
}

pub fn is_reset_keyword(text: &str) -> bool {
    let normalized = normalize_for_matching(text);
    RESET_KEYWORDS
        .iter()
        .any(|k| normalized == normalize_for_matching(k))
}

/// Normalize a button / quick-reply selection: leading digits win (so
/// "1. Acepto" becomes "1"), otherwise the trimmed label is kept.
pub fn normalize_button(selected: Option<&str>) -> Option<String> {
    let trimmed = selected?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() {
        return Some(digits);
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_round_trip_for_every_canonical_and_synonym() {
        for (canonical, synonyms) in ECUADOR_CITY_SYNONYMS {
            assert_eq!(normalize_city_input(canonical), Some(*canonical));
            for synonym in *synonyms {
                assert_eq!(
                    normalize_city_input(synonym),
                    Some(*canonical),
                    "synonym {synonym}"
                );
            }
        }
    }

    #[test]
    fn city_found_inside_sentence() {
        assert_eq!(normalize_city_input("lo necesito en cueca por favor"), Some("Cuenca"));
        assert_eq!(normalize_city_input("estoy en DURÁN"), Some("Durán"));
        assert_eq!(normalize_city_input("en mi ciudad"), None);
    }

    #[test]
    fn yes_no_numeric_override() {
        assert_eq!(interpret_yes_no("1"), Some(true));
        assert_eq!(interpret_yes_no("2. No acepto"), Some(false));
    }

    #[test]
    fn yes_no_word_lists() {
        assert_eq!(interpret_yes_no("sí claro"), Some(true));
        assert_eq!(interpret_yes_no("Acepto"), Some(true));
        assert_eq!(interpret_yes_no("no acepto"), Some(false));
        assert_eq!(interpret_yes_no("no gracias"), Some(false));
        assert_eq!(interpret_yes_no("quizás"), None);
        assert_eq!(interpret_yes_no(""), None);
    }

    #[test]
    fn button_normalization() {
        assert_eq!(normalize_button(Some("1. Acepto")), Some("1".to_string()));
        assert_eq!(normalize_button(Some("  2  ")), Some("2".to_string()));
        assert_eq!(
            normalize_button(Some("Sí, buscar de nuevo")),
            Some("Sí, buscar de nuevo".to_string())
        );
        assert_eq!(normalize_button(Some("   ")), None);
        assert_eq!(normalize_button(None), None);
    }

    #[test]
    fn greeting_and_reset_detection() {
        assert!(is_greeting("Hola"));
        assert!(is_greeting("buenos días"));
        assert!(!is_greeting("hola necesito un plomero"));
        assert!(is_reset_keyword("REINICIAR"));
        assert!(!is_reset_keyword("reiniciar todo"));
    }
}
