use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Single canonical matching form: lowercase, NFD-decompose, strip combining
/// marks, replace non-alphanumerics with spaces, collapse whitespace.
///
/// Every table lookup in this crate goes through this, so "Plomería" and
/// "plomeria" land on the same string.
pub fn normalize_for_matching(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    let spaced: String = folded
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `needle` present in `haystack` on word boundaries. Both arguments must
/// already be in canonical form.
pub fn contains_term(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let padded = format!(" {} ", haystack);
    padded.contains(&format!(" {} ", needle))
}
