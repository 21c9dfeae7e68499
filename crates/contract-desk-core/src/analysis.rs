//! Structured contract analysis and the LLM reply formats around it.
//!
//! The LLM is asked for JSON but replies are routinely wrapped in markdown
//! fences, preceded by prose, or missing fields. [`extract_json_object`]
//! locates the object, and every model here deserializes with defaults so a
//! partial reply still yields a usable value. When nothing can be parsed,
//! [`ContractAnalysis::fallback`] produces a placeholder that flags the
//! document for manual review.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::models::{parse_iso_date, ContractRecord};

/// Placeholder for key terms the model could not determine.
pub const NOT_SPECIFIED: &str = "Not specified";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("reply contains no JSON object")]
    NoJson,
    #[error("malformed JSON in reply: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown filter type '{0}'")]
    UnknownFilterKind(String),
}

/// Locate the JSON object in an LLM reply.
///
/// A fenced ```json block wins; otherwise the span from the first `{` to the
/// last `}` is returned.
pub fn extract_json_object(reply: &str) -> Option<&str> {
    if let Some(start) = reply.find("```") {
        let after_fence = &reply[start + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            let inner = body[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }
    let open = reply.find('{')?;
    let close = reply.rfind('}')?;
    (close > open).then(|| &reply[open..=close])
}

fn not_specified() -> String {
    NOT_SPECIFIED.to_string()
}

/// `null` reads as the type's default, the same as an absent key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Key term text; `null` reads as [`NOT_SPECIFIED`] and bare numbers as
/// their decimal text.
fn key_term<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => not_specified(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

/// A JSON number, or a string holding one. Anything else is `None`.
fn loose_number(value: Option<serde_json::Value>) -> Option<f64> {
    let number = match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_number(Option::deserialize(deserializer)?))
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_number(Option::deserialize(deserializer)?)
        .filter(|n| *n >= 0.0 && *n <= f64::from(u32::MAX))
        .map(|n| n.round() as u32))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyTerms {
    #[serde(default, deserialize_with = "null_as_default")]
    pub parties: Vec<String>,
    #[serde(default = "not_specified", deserialize_with = "key_term")]
    pub value: String,
    #[serde(default = "not_specified", deserialize_with = "key_term")]
    pub start_date: String,
    #[serde(default = "not_specified", deserialize_with = "key_term")]
    pub end_date: String,
    #[serde(default = "not_specified", deserialize_with = "key_term")]
    pub duration: String,
}

impl Default for KeyTerms {
    fn default() -> Self {
        Self {
            parties: Vec::new(),
            value: not_specified(),
            start_date: not_specified(),
            end_date: not_specified(),
            duration: not_specified(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub high_risk: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub medium_risk: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub low_risk: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clauses {
    #[serde(default, deserialize_with = "null_as_default")]
    pub payment: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub termination: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub liability: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub other: Vec<String>,
}

/// Structured analysis of one contract document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_terms: KeyTerms,
    #[serde(default, deserialize_with = "null_as_default")]
    pub risk_analysis: RiskAnalysis,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clauses: Clauses,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendations: Vec<String>,
    /// Quality score, 0-100.
    #[serde(default, deserialize_with = "clamped_score")]
    pub score: u8,
}

fn clamped_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let number = loose_number(Option::deserialize(deserializer)?).unwrap_or(0.0);
    Ok(number.round().clamp(0.0, 100.0) as u8)
}

impl ContractAnalysis {
    /// Parse an analysis reply.
    pub fn parse(reply: &str) -> Result<Self, ParseError> {
        let json = extract_json_object(reply).ok_or(ParseError::NoJson)?;
        Ok(serde_json::from_str(json)?)
    }

    /// Placeholder analysis for a document that could not be analyzed.
    pub fn fallback(reason: &str) -> Self {
        Self {
            summary: format!("Analysis unavailable: {}. Review manually.", reason),
            key_terms: KeyTerms::default(),
            risk_analysis: RiskAnalysis {
                high_risk: vec![format!("Automatic analysis failed: {}", reason)],
                ..RiskAnalysis::default()
            },
            clauses: Clauses::default(),
            recommendations: vec!["Perform a manual legal review of this document".to_string()],
            score: 0,
        }
    }

    pub fn risk_bucket(&self) -> RiskBucket {
        RiskBucket::of(&self.risk_analysis)
    }
}

/// Overall risk classification of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBucket {
    High,
    Medium,
    Low,
}

impl RiskBucket {
    /// High if any high risk was found, else Medium if any medium risk, else Low.
    pub fn of(risks: &RiskAnalysis) -> Self {
        if !risks.high_risk.is_empty() {
            RiskBucket::High
        } else if !risks.medium_risk.is_empty() {
            RiskBucket::Medium
        } else {
            RiskBucket::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskBucket::High => "high",
            RiskBucket::Medium => "medium",
            RiskBucket::Low => "low",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "high" => Some(RiskBucket::High),
            "medium" => Some(RiskBucket::Medium),
            "low" => Some(RiskBucket::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkRisks {
    #[serde(default, deserialize_with = "null_as_default")]
    pub high: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub medium: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub low: Vec<String>,
}

/// Findings for one section of a document analyzed in chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkFindings {
    #[serde(default, deserialize_with = "null_as_default")]
    pub section: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_points: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub risks: ChunkRisks,
    #[serde(default, deserialize_with = "null_as_default")]
    pub values: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dates: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parties: Vec<String>,
    /// The section continues in another chunk.
    #[serde(default, deserialize_with = "null_as_default")]
    pub incomplete: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
}

impl ChunkFindings {
    pub fn parse(reply: &str) -> Result<Self, ParseError> {
        let json = extract_json_object(reply).ok_or(ParseError::NoJson)?;
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// Registration fields read out of a contract document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub contracting_party: Option<String>,
    #[serde(default)]
    pub flow_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub contract_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub payment_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub installment_count: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: Location,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub responsible_area: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub installment_due_dates: Vec<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub penalty: Option<f64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ExtractedFields {
    pub fn parse(reply: &str) -> Result<Self, ParseError> {
        let json = extract_json_object(reply).ok_or(ParseError::NoJson)?;
        Ok(serde_json::from_str(json)?)
    }

    /// Build a contract record under `id`. Blank strings become `None`;
    /// an unparseable due date is dropped.
    pub fn into_record(self, id: impl Into<String>) -> ContractRecord {
        let due_date = self.due_date.as_deref().and_then(parse_iso_date);
        ContractRecord {
            supplier: non_blank(self.supplier),
            flow_type: non_blank(self.flow_type),
            contract_value: self.contract_value,
            payment_value: self.payment_value,
            state: non_blank(self.location.state),
            city: non_blank(self.location.city),
            due_date,
            responsible_area: non_blank(self.responsible_area),
            ..ContractRecord::new(id)
        }
    }
}

/// Tally of a batch analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(skip)]
    score_sum: u64,
}

impl BatchSummary {
    pub fn record_success(&mut self, score: u8) {
        self.total += 1;
        self.succeeded += 1;
        self.score_sum += u64::from(score);
    }

    pub fn record_failure(&mut self) {
        self.total += 1;
        self.failed += 1;
    }

    /// Mean score over successful documents; `None` when none succeeded.
    pub fn average_score(&self) -> Option<f64> {
        (self.succeeded > 0).then(|| self.score_sum as f64 / self.succeeded as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json() {
        let reply = "Here you go:\n```json\n{\"score\": 80}\n```\nThanks";
        assert_eq!(extract_json_object(reply), Some("{\"score\": 80}"));
    }

    #[test]
    fn extracts_outer_braces_without_fence() {
        let reply = "Result: {\"a\": {\"b\": 1}} done";
        assert_eq!(extract_json_object(reply), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json_object("no json here"), None);
    }

    #[test]
    fn partial_analysis_gets_defaults() {
        let analysis = ContractAnalysis::parse(
            r#"{"summary": "Lease", "riskAnalysis": {"mediumRisk": ["tight deadline"]}, "score": 71.6}"#,
        )
        .unwrap();
        assert_eq!(analysis.summary, "Lease");
        assert_eq!(analysis.key_terms.value, NOT_SPECIFIED);
        assert_eq!(analysis.score, 72);
        assert_eq!(analysis.risk_bucket(), RiskBucket::Medium);
    }

    #[test]
    fn score_is_clamped() {
        let analysis = ContractAnalysis::parse(r#"{"score": 250}"#).unwrap();
        assert_eq!(analysis.score, 100);
        let analysis = ContractAnalysis::parse(r#"{"score": "n/a"}"#).unwrap();
        assert_eq!(analysis.score, 0);
    }

    #[test]
    fn malformed_reply_is_an_error() {
        assert!(matches!(
            ContractAnalysis::parse("I cannot help"),
            Err(ParseError::NoJson)
        ));
        assert!(matches!(
            ContractAnalysis::parse("{ not json }"),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn fallback_flags_high_risk() {
        let analysis = ContractAnalysis::fallback("timeout");
        assert_eq!(analysis.score, 0);
        assert_eq!(analysis.risk_analysis.high_risk.len(), 1);
        assert!(analysis.summary.contains("timeout"));
        assert_eq!(analysis.risk_bucket(), RiskBucket::High);
    }

    #[test]
    fn clean_analysis_is_low_risk() {
        let analysis = ContractAnalysis::parse(r#"{"riskAnalysis": {"lowRisk": ["typo"]}}"#).unwrap();
        assert_eq!(analysis.risk_bucket(), RiskBucket::Low);
    }

    #[test]
    fn extracted_fields_become_record() {
        let reply = r#"```json
{
  "supplier": "Acme Ltd",
  "flow_type": "RE",
  "contract_value": 120000,
  "location": {"state": "SP", "city": " "},
  "due_date": "2025-12-31",
  "responsible_area": ""
}
```"#;
        let record = ExtractedFields::parse(reply).unwrap().into_record("CT-9");
        assert_eq!(record.id, "CT-9");
        assert_eq!(record.supplier.as_deref(), Some("Acme Ltd"));
        assert_eq!(record.state.as_deref(), Some("SP"));
        assert!(record.city.is_none());
        assert!(record.responsible_area.is_none());
        assert_eq!(record.due_date, chrono::NaiveDate::from_ymd_opt(2025, 12, 31));
    }

    #[test]
    fn null_fields_read_as_missing() {
        let analysis = ContractAnalysis::parse(
            r#"{"summary": "Lease", "keyTerms": {"value": null, "parties": null, "duration": 24},
                "riskAnalysis": {"highRisk": null, "mediumRisk": ["late fees"]},
                "clauses": null, "recommendations": null, "score": 80}"#,
        )
        .unwrap();
        assert_eq!(analysis.summary, "Lease");
        assert_eq!(analysis.key_terms.value, NOT_SPECIFIED);
        assert_eq!(analysis.key_terms.duration, "24");
        assert!(analysis.key_terms.parties.is_empty());
        assert!(analysis.recommendations.is_empty());
        assert_eq!(analysis.clauses, Clauses::default());
        assert_eq!(analysis.score, 80);
        assert_eq!(analysis.risk_bucket(), RiskBucket::Medium);
    }

    #[test]
    fn null_chunk_findings_read_as_missing() {
        let findings = ChunkFindings::parse(
            r#"{"section": null, "keyPoints": ["term of 12 months"], "risks": null, "incomplete": null}"#,
        )
        .unwrap();
        assert_eq!(findings.section, "");
        assert_eq!(findings.key_points, vec!["term of 12 months"]);
        assert_eq!(findings.risks, ChunkRisks::default());
        assert!(!findings.incomplete);
    }

    #[test]
    fn extracted_numbers_may_be_strings() {
        let fields = ExtractedFields::parse(
            r#"{"supplier": "Acme", "contract_value": "120000", "payment_value": " 9500.50 ",
                "installment_count": "12", "penalty": "n/a", "location": null,
                "installment_due_dates": null}"#,
        )
        .unwrap();
        assert_eq!(fields.contract_value, Some(120_000.0));
        assert_eq!(fields.payment_value, Some(9_500.5));
        assert_eq!(fields.installment_count, Some(12));
        assert_eq!(fields.penalty, None);
        assert_eq!(fields.location, Location::default());
        assert!(fields.installment_due_dates.is_empty());

        let record = fields.into_record("CT-2");
        assert_eq!(record.contract_value, Some(120_000.0));
        assert_eq!(record.supplier.as_deref(), Some("Acme"));
    }

    #[test]
    fn negative_installment_count_is_dropped() {
        let fields = ExtractedFields::parse(r#"{"installment_count": -3}"#).unwrap();
        assert_eq!(fields.installment_count, None);
    }

    #[test]
    fn batch_summary_averages_successes() {
        let mut summary = BatchSummary::default();
        assert_eq!(summary.average_score(), None);
        summary.record_success(80);
        summary.record_failure();
        summary.record_success(60);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.average_score(), Some(70.0));
    }
}
