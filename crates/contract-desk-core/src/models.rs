//! Core data models used throughout Contract Desk.
//!
//! [`ContractRecord`] is the unit the store returns, the filters test, and
//! the sampler selects. Every descriptive field is optional: rows coming out
//! of the data store are routinely incomplete, and the categorization layer
//! maps missing values onto the sentinel category instead of dropping them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::analysis::{ContractAnalysis, RiskBucket};

/// A single contract row.
///
/// Field names follow the store's snake_case columns; camelCase aliases are
/// accepted on input so JSON exported from the dashboard imports unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    /// Contract number. Unique within the store.
    pub id: String,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default, alias = "flowType")]
    pub flow_type: Option<String>,
    #[serde(default, alias = "contractValue")]
    pub contract_value: Option<f64>,
    #[serde(default, alias = "paymentValue")]
    pub payment_value: Option<f64>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, alias = "signedDate", deserialize_with = "lenient_date")]
    pub signed_date: Option<NaiveDate>,
    #[serde(default, alias = "dueDate", deserialize_with = "lenient_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, alias = "responsibleArea")]
    pub responsible_area: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, alias = "riskLevel")]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default, alias = "documentUrl")]
    pub document_url: Option<String>,
}

impl ContractRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Parse a date that may be a bare `YYYY-MM-DD` or a full ISO-8601
/// timestamp. Only the calendar date is kept.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_iso_date(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: '{}'", s))),
    }
}

/// A persisted analysis run for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAnalysis {
    pub id: String,
    /// Contract the document belongs to, when known.
    pub contract_id: Option<String>,
    pub file_name: String,
    /// SHA-256 of the cleaned document text.
    pub text_hash: String,
    pub analysis: ContractAnalysis,
    pub risk_bucket: RiskBucket,
    pub processing_ms: u64,
    /// Set when the analysis is a fallback produced after a failure.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_and_timestamps() {
        let json = r#"{
            "id": "CT-2024-001",
            "flowType": "RE",
            "contractValue": 150000,
            "dueDate": "2024-12-31T00:00:00Z",
            "region": "Southeast"
        }"#;
        let record: ContractRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.flow_type.as_deref(), Some("RE"));
        assert_eq!(record.contract_value, Some(150000.0));
        assert_eq!(record.due_date, NaiveDate::from_ymd_opt(2024, 12, 31));
        assert!(record.supplier.is_none());
    }

    #[test]
    fn blank_date_is_none() {
        let record: ContractRecord =
            serde_json::from_str(r#"{"id": "x", "due_date": ""}"#).unwrap();
        assert!(record.due_date.is_none());
    }

    #[test]
    fn garbage_date_is_rejected() {
        let err = serde_json::from_str::<ContractRecord>(r#"{"id": "x", "due_date": "soon"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("invalid date"));
    }
}
