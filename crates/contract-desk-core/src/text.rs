//! Accent-insensitive text normalization.
//!
//! Contract fields are typed by hand and arrive with inconsistent accents
//! and casing ("Jurídico", "juridico", "JURIDICO"). Comparisons go through
//! [`normalize_for_comparison`]; display values go through
//! [`normalize_field_value`], which also folds known synonyms onto a
//! canonical spelling for the risk, priority and responsible-area fields.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercase, accent-free, trimmed form used for matching.
pub fn normalize_for_comparison(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Accent-free display form: lowercase with the first letter upper-cased.
pub fn normalize_text(text: &str) -> String {
    let lowered = normalize_for_comparison(text);
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// True when `needle` occurs in `haystack`, ignoring case and accents.
pub fn contains_normalized(haystack: &str, needle: &str) -> bool {
    normalize_for_comparison(haystack).contains(&normalize_for_comparison(needle))
}

const RISK_VALUES: &[(&str, &str)] = &[
    ("baixo", "Low"),
    ("low", "Low"),
    ("medio", "Medium"),
    ("medium", "Medium"),
    ("alto", "High"),
    ("high", "High"),
    ("critico", "Critical"),
    ("critical", "Critical"),
];

const PRIORITY_VALUES: &[(&str, &str)] = &[
    ("baixa", "Low"),
    ("low", "Low"),
    ("media", "Medium"),
    ("medium", "Medium"),
    ("alta", "High"),
    ("high", "High"),
    ("urgente", "Urgent"),
    ("urgent", "Urgent"),
    ("critica", "Critical"),
    ("critical", "Critical"),
];

const AREA_VALUES: &[(&str, &str)] = &[
    ("financeiro", "Finance"),
    ("finance", "Finance"),
    ("juridico", "Legal"),
    ("legal", "Legal"),
    ("operacoes", "Operations"),
    ("operations", "Operations"),
    ("ti", "IT"),
    ("it", "IT"),
    ("rh", "HR"),
    ("hr", "HR"),
    ("recursos humanos", "HR"),
    ("comercial", "Sales"),
    ("sales", "Sales"),
    ("compras", "Procurement"),
    ("procurement", "Procurement"),
];

/// Fields whose values are folded onto a canonical vocabulary.
pub fn has_canonical_vocabulary(field: &str) -> bool {
    matches!(field, "risk_level" | "priority" | "responsible_area")
}

/// Canonical display value for `value` in `field`.
///
/// Known synonyms map to their canonical label; anything else gets
/// [`normalize_text`].
pub fn normalize_field_value(field: &str, value: &str) -> String {
    let table: &[(&str, &str)] = match field {
        "risk_level" => RISK_VALUES,
        "priority" => PRIORITY_VALUES,
        "responsible_area" => AREA_VALUES,
        _ => &[],
    };
    let key = normalize_for_comparison(value);
    table
        .iter()
        .find(|(raw, _)| *raw == key)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| normalize_text(value))
}
