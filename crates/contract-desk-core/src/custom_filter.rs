//! User-defined filters over contract fields.
//!
//! A [`CustomFilter`] names a contract field and a widget kind; a
//! [`FilterValue`] supplied at query time is tested against each record by
//! [`CustomFilter::matches`]. Filter kinds can be inferred by the LLM from a
//! column name and a few sample values; [`parse_inferred_filter`] turns that
//! reply into an [`InferredFilter`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analysis::{extract_json_object, ParseError};
use crate::models::{parse_iso_date, ContractRecord};
use crate::text::{contains_normalized, has_canonical_vocabulary, normalize_for_comparison};

/// Widget kind of a custom filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Dropdown,
    MultiSelect,
    Input,
    Text,
    Number,
    Range,
    Date,
    DateRange,
    Checkbox,
}

impl FilterKind {
    /// Map a free-form kind label (as typed by users or returned by the LLM)
    /// onto a kind. Case-insensitive; English and Portuguese synonyms.
    pub fn from_label(label: &str) -> Option<Self> {
        let key = normalize_for_comparison(label);
        let kind = match key.as_str() {
            "select" | "seletor" | "dropdown" => FilterKind::Dropdown,
            "dropdown multiselect" | "multi-select" | "multiselect" | "multi_select" => {
                FilterKind::MultiSelect
            }
            "input" => FilterKind::Input,
            "text" | "texto" => FilterKind::Text,
            "number" | "numero" => FilterKind::Number,
            "range" | "intervalo" | "numberrange" | "number-range" | "intervalo-numerico" => {
                FilterKind::Range
            }
            "date" | "data" => FilterKind::Date,
            "daterange" | "date-range" | "date_range" | "data-range" | "intervalo-datas" => {
                FilterKind::DateRange
            }
            "boolean" | "checkbox" => FilterKind::Checkbox,
            _ => return None,
        };
        Some(kind)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FilterKind::Dropdown => "dropdown",
            FilterKind::MultiSelect => "multi_select",
            FilterKind::Input => "input",
            FilterKind::Text => "text",
            FilterKind::Number => "number",
            FilterKind::Range => "range",
            FilterKind::Date => "date",
            FilterKind::DateRange => "date_range",
            FilterKind::Checkbox => "checkbox",
        }
    }
}

/// Contract fields a custom filter may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractField {
    Id,
    Supplier,
    FlowType,
    ContractValue,
    PaymentValue,
    Region,
    State,
    City,
    SignedDate,
    DueDate,
    ResponsibleArea,
    Status,
    Priority,
    RiskLevel,
    Owner,
}

/// Value of a contract field, typed by the field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(Option<&'a str>),
    Number(Option<f64>),
    Date(Option<NaiveDate>),
}

impl ContractField {
    pub const ALL: [ContractField; 15] = [
        ContractField::Id,
        ContractField::Supplier,
        ContractField::FlowType,
        ContractField::ContractValue,
        ContractField::PaymentValue,
        ContractField::Region,
        ContractField::State,
        ContractField::City,
        ContractField::SignedDate,
        ContractField::DueDate,
        ContractField::ResponsibleArea,
        ContractField::Status,
        ContractField::Priority,
        ContractField::RiskLevel,
        ContractField::Owner,
    ];

    /// Store column name.
    pub fn column(&self) -> &'static str {
        match self {
            ContractField::Id => "id",
            ContractField::Supplier => "supplier",
            ContractField::FlowType => "flow_type",
            ContractField::ContractValue => "contract_value",
            ContractField::PaymentValue => "payment_value",
            ContractField::Region => "region",
            ContractField::State => "state",
            ContractField::City => "city",
            ContractField::SignedDate => "signed_date",
            ContractField::DueDate => "due_date",
            ContractField::ResponsibleArea => "responsible_area",
            ContractField::Status => "status",
            ContractField::Priority => "priority",
            ContractField::RiskLevel => "risk_level",
            ContractField::Owner => "owner",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.iter().copied().find(|f| f.column() == name)
    }

    pub fn value<'a>(&self, record: &'a ContractRecord) -> FieldValue<'a> {
        match self {
            ContractField::Id => FieldValue::Text(Some(record.id.as_str())),
            ContractField::Supplier => FieldValue::Text(record.supplier.as_deref()),
            ContractField::FlowType => FieldValue::Text(record.flow_type.as_deref()),
            ContractField::ContractValue => FieldValue::Number(record.contract_value),
            ContractField::PaymentValue => FieldValue::Number(record.payment_value),
            ContractField::Region => FieldValue::Text(record.region.as_deref()),
            ContractField::State => FieldValue::Text(record.state.as_deref()),
            ContractField::City => FieldValue::Text(record.city.as_deref()),
            ContractField::SignedDate => FieldValue::Date(record.signed_date),
            ContractField::DueDate => FieldValue::Date(record.due_date),
            ContractField::ResponsibleArea => FieldValue::Text(record.responsible_area.as_deref()),
            ContractField::Status => FieldValue::Text(record.status.as_deref()),
            ContractField::Priority => FieldValue::Text(record.priority.as_deref()),
            ContractField::RiskLevel => FieldValue::Text(record.risk_level.as_deref()),
            ContractField::Owner => FieldValue::Text(record.owner.as_deref()),
        }
    }
}

/// A saved custom filter definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFilter {
    pub id: String,
    pub name: String,
    pub kind: FilterKind,
    pub field: ContractField,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A value supplied for a custom filter at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
    Range([f64; 2]),
}

impl FilterValue {
    /// Blank text and empty lists leave the filter unapplied.
    pub fn is_empty(&self) -> bool {
        match self {
            FilterValue::Text(s) => s.trim().is_empty(),
            FilterValue::List(items) => items.is_empty(),
            FilterValue::Number(_) | FilterValue::Range(_) => false,
        }
    }
}

impl CustomFilter {
    /// Test `record` against `value`. An empty value matches everything.
    pub fn matches(&self, record: &ContractRecord, value: &FilterValue) -> bool {
        if value.is_empty() {
            return true;
        }
        let canonical = has_canonical_vocabulary(self.field.column());
        match (self.field.value(record), value) {
            (FieldValue::Text(field), FilterValue::List(wanted)) => {
                let Some(field) = field else { return false };
                wanted.iter().any(|w| {
                    if canonical {
                        contains_normalized(field, w)
                    } else {
                        field == w
                    }
                })
            }
            (FieldValue::Text(field), FilterValue::Text(wanted)) => {
                let Some(field) = field else { return false };
                match self.kind {
                    FilterKind::Input | FilterKind::Text => contains_normalized(field, wanted),
                    _ if canonical => contains_normalized(field, wanted),
                    _ => field == wanted.trim(),
                }
            }
            (FieldValue::Number(field), FilterValue::Number(wanted)) => {
                field.is_some_and(|v| (v - wanted).abs() < f64::EPSILON)
            }
            (FieldValue::Number(field), FilterValue::Text(wanted)) => {
                match (field, wanted.trim().parse::<f64>()) {
                    (Some(v), Ok(w)) => (v - w).abs() < f64::EPSILON,
                    _ => false,
                }
            }
            (FieldValue::Number(field), FilterValue::Range([min, max])) => {
                field.is_some_and(|v| v >= *min && v <= *max)
            }
            (FieldValue::Date(field), FilterValue::Text(wanted)) => {
                field.is_some() && field == parse_iso_date(wanted)
            }
            (FieldValue::Date(field), FilterValue::List(bounds)) if bounds.len() == 2 => {
                match (field, parse_iso_date(&bounds[0]), parse_iso_date(&bounds[1])) {
                    (Some(d), Some(start), Some(end)) => d >= start && d <= end,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

/// Filter kind and widget configuration proposed by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferredFilter {
    pub kind: FilterKind,
    pub config: serde_json::Value,
}

#[derive(Deserialize)]
struct InferenceReply {
    filter_type: String,
    #[serde(default)]
    config: serde_json::Value,
}

/// Parse an LLM reply to a filter inference prompt.
///
/// Expects `{"filter_type": "...", "config": {...}}`, possibly fenced. A
/// reply that is not JSON is read as a bare kind label.
pub fn parse_inferred_filter(reply: &str) -> Result<InferredFilter, ParseError> {
    let parsed = extract_json_object(reply)
        .and_then(|json| serde_json::from_str::<InferenceReply>(json).ok());
    let (label, config) = match parsed {
        Some(r) => (r.filter_type, r.config),
        None => (reply.trim().trim_matches('`').trim().to_string(), serde_json::Value::Null),
    };
    let kind = FilterKind::from_label(&label).ok_or(ParseError::UnknownFilterKind(label))?;
    let config = if config.is_null() {
        serde_json::json!({})
    } else {
        config
    };
    Ok(InferredFilter { kind, config })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(kind: FilterKind, field: ContractField) -> CustomFilter {
        CustomFilter {
            id: "f1".into(),
            name: "test".into(),
            kind,
            field,
            options: Vec::new(),
            description: None,
        }
    }

    #[test]
    fn kind_labels_map() {
        assert_eq!(FilterKind::from_label("Seletor"), Some(FilterKind::Dropdown));
        assert_eq!(
            FilterKind::from_label("multiselect"),
            Some(FilterKind::MultiSelect)
        );
        assert_eq!(
            FilterKind::from_label("intervalo-datas"),
            Some(FilterKind::DateRange)
        );
        assert_eq!(FilterKind::from_label("número"), Some(FilterKind::Number));
        assert_eq!(FilterKind::from_label("slider"), None);
    }

    #[test]
    fn dropdown_list_on_canonical_field_ignores_accents() {
        let mut r = ContractRecord::new("1");
        r.risk_level = Some("Médio".into());
        let f = filter(FilterKind::Dropdown, ContractField::RiskLevel);
        assert!(f.matches(&r, &FilterValue::List(vec!["medio".into()])));
        assert!(!f.matches(&r, &FilterValue::List(vec!["alto".into()])));
    }

    #[test]
    fn dropdown_text_on_plain_field_is_exact() {
        let mut r = ContractRecord::new("1");
        r.status = Some("Paid".into());
        let f = filter(FilterKind::Dropdown, ContractField::Status);
        assert!(f.matches(&r, &FilterValue::Text("Paid".into())));
        assert!(!f.matches(&r, &FilterValue::Text("paid".into())));
    }

    #[test]
    fn range_on_numeric_field() {
        let mut r = ContractRecord::new("1");
        r.contract_value = Some(75_000.0);
        let f = filter(FilterKind::Range, ContractField::ContractValue);
        assert!(f.matches(&r, &FilterValue::Range([50_000.0, 100_000.0])));
        assert!(!f.matches(&r, &FilterValue::Range([80_000.0, 100_000.0])));
    }

    #[test]
    fn date_equality_and_range() {
        let mut r = ContractRecord::new("1");
        r.due_date = NaiveDate::from_ymd_opt(2025, 3, 15);
        let f = filter(FilterKind::Date, ContractField::DueDate);
        assert!(f.matches(&r, &FilterValue::Text("2025-03-15".into())));
        assert!(f.matches(
            &r,
            &FilterValue::List(vec!["2025-03-01".into(), "2025-03-31".into()])
        ));
    }

    #[test]
    fn empty_value_matches_everything() {
        let r = ContractRecord::new("1");
        let f = filter(FilterKind::Input, ContractField::Supplier);
        assert!(f.matches(&r, &FilterValue::Text("  ".into())));
    }

    #[test]
    fn untagged_values_deserialize() {
        let v: FilterValue = serde_json::from_str("[1, 2]").unwrap();
        assert_eq!(v, FilterValue::Range([1.0, 2.0]));
        let v: FilterValue = serde_json::from_str(r#"["a"]"#).unwrap();
        assert_eq!(v, FilterValue::List(vec!["a".into()]));
    }

    #[test]
    fn inference_reply_parses_fenced_json() {
        let reply = "```json\n{\"filter_type\": \"dropdown\", \"config\": {\"options\": [\"A\"]}}\n```";
        let inferred = parse_inferred_filter(reply).unwrap();
        assert_eq!(inferred.kind, FilterKind::Dropdown);
        assert_eq!(inferred.config["options"][0], "A");
    }

    #[test]
    fn inference_reply_falls_back_to_bare_label() {
        let inferred = parse_inferred_filter("daterange").unwrap();
        assert_eq!(inferred.kind, FilterKind::DateRange);
        assert_eq!(inferred.config, serde_json::json!({}));
        assert!(matches!(
            parse_inferred_filter("no idea"),
            Err(ParseError::UnknownFilterKind(_))
        ));
    }
}
