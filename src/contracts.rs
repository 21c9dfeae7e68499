//! Contract commands: import, list (filtered) and representative sampling.
//!
//! The same [`ContractQuery`] backs `cdesk list` flags and the
//! `GET /contracts` query string, so both surfaces filter identically.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Args;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use contract_desk_core::category::DiversityReport;
use contract_desk_core::custom_filter::{CustomFilter, FilterValue};
use contract_desk_core::filter::{ContractFilter, DueWindow};
use contract_desk_core::models::{parse_iso_date, ContractRecord};
use contract_desk_core::sampler::RepresentativeSampler;
use contract_desk_core::store::ContractStore;

/// Sampling was asked of an empty store.
#[derive(Debug, Error)]
#[error("no contracts available")]
pub struct NoContracts;

/// Today's date in local time; every date window is relative to it.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Contract filter parameters as accepted on the command line and in
/// query strings. Lists are comma-separated.
#[derive(Debug, Clone, Default, Args, Deserialize)]
#[serde(default)]
pub struct ContractQuery {
    /// Flow types to keep (exact), e.g. `RE,FI`.
    #[arg(long = "flow-types")]
    pub flow_types: Option<String>,
    /// Supplier name substring (case- and accent-insensitive).
    #[arg(long)]
    pub supplier: Option<String>,
    /// Contract number substring.
    #[arg(long = "contract-number")]
    pub contract_number: Option<String>,
    #[arg(long)]
    pub region: Option<String>,
    /// States to keep (any-of substring), e.g. `SP,RJ`.
    #[arg(long)]
    pub states: Option<String>,
    #[arg(long = "min-value")]
    pub min_value: Option<f64>,
    #[arg(long = "max-value")]
    pub max_value: Option<f64>,
    #[arg(long = "min-payment")]
    pub min_payment: Option<f64>,
    #[arg(long = "max-payment")]
    pub max_payment: Option<f64>,
    /// Due window: overdue, next7days, next30days, 30-60, 60-90 or custom.
    #[arg(long)]
    pub due: Option<String>,
    /// Start of a custom due window (YYYY-MM-DD).
    #[arg(long = "due-from")]
    pub due_from: Option<String>,
    /// End of a custom due window (YYYY-MM-DD).
    #[arg(long = "due-to")]
    pub due_to: Option<String>,
    /// Maximum number of contracts returned.
    #[arg(long)]
    pub limit: Option<usize>,
}

fn split_list(raw: &Option<String>) -> Vec<String> {
    raw.as_deref()
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_date_arg(name: &str, raw: &Option<String>) -> Result<Option<NaiveDate>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_iso_date(s)
            .map(Some)
            .with_context(|| format!("invalid {} date '{}': expected YYYY-MM-DD", name, s)),
    }
}

fn range(name: &str, min: Option<f64>, max: Option<f64>) -> Result<Option<(f64, f64)>> {
    match (min, max) {
        (None, None) => Ok(None),
        (min, max) => {
            let (min, max) = (min.unwrap_or(0.0), max.unwrap_or(f64::MAX));
            if min > max {
                bail!("invalid {} range: min {} exceeds max {}", name, min, max);
            }
            Ok(Some((min, max)))
        }
    }
}

impl ContractQuery {
    /// Validate and convert into a [`ContractFilter`].
    pub fn to_filter(&self) -> Result<ContractFilter> {
        let due_window = match self.due.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(label) if label.eq_ignore_ascii_case("custom") => Some(DueWindow::Custom {
                start: parse_date_arg("due-from", &self.due_from)?,
                end: parse_date_arg("due-to", &self.due_to)?,
            }),
            Some(label) => Some(DueWindow::from_label(label).with_context(|| {
                format!(
                    "unknown due window '{}': expected overdue, next7days, next30days, 30-60, 60-90 or custom",
                    label
                )
            })?),
        };
        Ok(ContractFilter {
            flow_types: split_list(&self.flow_types),
            supplier: self.supplier.clone(),
            contract_number: self.contract_number.clone(),
            region: self.region.clone(),
            states: split_list(&self.states),
            value_range: range("value", self.min_value, self.max_value)?,
            payment_range: range("payment", self.min_payment, self.max_payment)?,
            due_window,
            custom: Vec::new(),
            limit: self.limit,
        })
    }
}

/// Parse `FILTER_ID=VALUE` where VALUE is JSON (number, string list,
/// `[min, max]`) or plain text.
pub fn parse_custom_arg(raw: &str) -> Result<(String, FilterValue)> {
    let (id, value) = raw
        .split_once('=')
        .with_context(|| format!("invalid custom filter '{}': expected ID=VALUE", raw))?;
    let value = value.trim();
    let parsed = serde_json::from_str::<FilterValue>(value)
        .unwrap_or_else(|_| FilterValue::Text(value.to_string()));
    Ok((id.trim().to_string(), parsed))
}

/// Resolve `(filter id, value)` pairs against the stored custom filters.
pub fn resolve_custom(
    defined: &[CustomFilter],
    wanted: Vec<(String, FilterValue)>,
) -> Result<Vec<(CustomFilter, FilterValue)>> {
    wanted
        .into_iter()
        .map(|(id, value)| {
            let filter = defined
                .iter()
                .find(|f| f.id == id || f.name.eq_ignore_ascii_case(&id))
                .with_context(|| format!("custom filter not found: {}", id))?;
            Ok((filter.clone(), value))
        })
        .collect()
}

/// Load a JSON array of contracts from `path` and upsert each one.
pub async fn import_contracts(store: &dyn ContractStore, path: &Path) -> Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let records: Vec<ContractRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of contracts", path.display()))?;
    for record in &records {
        if record.id.trim().is_empty() {
            bail!("contract without id in {}", path.display());
        }
        store.upsert_contract(record).await?;
    }
    info!(count = records.len(), file = %path.display(), "imported contracts");
    Ok(records.len())
}

/// A representative sample and how well it covers the population.
#[derive(Debug, Serialize)]
pub struct SampleResult {
    pub contracts: Vec<ContractRecord>,
    pub diversity: DiversityReport,
}

/// Select `size` representative contracts from the whole store.
pub async fn sample_contracts(
    store: &dyn ContractStore,
    size: usize,
    today: NaiveDate,
) -> Result<SampleResult> {
    let all = store.all_contracts().await?;
    if all.is_empty() {
        return Err(NoContracts.into());
    }
    let selection = RepresentativeSampler::select(&all, size);
    let diversity = DiversityReport::compare(&all, &selection, today);
    info!(population = all.len(), selected = selection.len(), "sampled contracts");
    Ok(SampleResult {
        contracts: selection.into_iter().cloned().collect(),
        diversity,
    })
}

fn show(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("-")
}

/// Print contracts as an aligned table.
pub fn print_table(records: &[ContractRecord]) {
    if records.is_empty() {
        println!("No contracts.");
        return;
    }
    println!(
        "{:<16} {:<28} {:<6} {:>14} {:<12} {:<4} {:<10}",
        "ID", "SUPPLIER", "FLOW", "VALUE", "REGION", "UF", "DUE"
    );
    println!("{}", "-".repeat(96));
    for r in records {
        let value = r
            .contract_value
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "-".to_string());
        let due = r
            .due_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        let supplier: String = show(r.supplier.as_deref()).chars().take(28).collect();
        println!(
            "{:<16} {:<28} {:<6} {:>14} {:<12} {:<4} {:<10}",
            r.id,
            supplier,
            show(r.flow_type.as_deref()),
            value,
            show(r.region.as_deref()),
            show(r.state.as_deref()),
            due
        );
    }
    println!();
    println!("{} contract(s)", records.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use contract_desk_core::custom_filter::{ContractField, FilterKind};
    use contract_desk_core::store::memory::InMemoryStore;
    use std::io::Write;

    fn record(id: &str, region: &str) -> ContractRecord {
        ContractRecord {
            region: Some(region.to_string()),
            ..ContractRecord::new(id)
        }
    }

    #[test]
    fn query_builds_filter() {
        let query = ContractQuery {
            flow_types: Some("RE, FI,".into()),
            states: Some("SP".into()),
            min_value: Some(1000.0),
            due: Some("next30days".into()),
            limit: Some(5),
            ..ContractQuery::default()
        };
        let filter = query.to_filter().unwrap();
        assert_eq!(filter.flow_types, vec!["RE", "FI"]);
        assert_eq!(filter.states, vec!["SP"]);
        assert_eq!(filter.value_range, Some((1000.0, f64::MAX)));
        assert_eq!(filter.due_window, Some(DueWindow::Next30Days));
        assert_eq!(filter.limit, Some(5));
    }

    #[test]
    fn custom_due_window_reads_dates() {
        let query = ContractQuery {
            due: Some("custom".into()),
            due_from: Some("2024-01-01".into()),
            ..ContractQuery::default()
        };
        assert_eq!(
            query.to_filter().unwrap().due_window,
            Some(DueWindow::Custom {
                start: NaiveDate::from_ymd_opt(2024, 1, 1),
                end: None
            })
        );
    }

    #[test]
    fn bad_query_values_are_rejected() {
        let unknown = ContractQuery {
            due: Some("someday".into()),
            ..ContractQuery::default()
        };
        assert!(unknown.to_filter().is_err());

        let inverted = ContractQuery {
            min_payment: Some(10.0),
            max_payment: Some(1.0),
            ..ContractQuery::default()
        };
        assert!(inverted.to_filter().is_err());
    }

    #[test]
    fn custom_args_parse_json_or_text() {
        assert_eq!(
            parse_custom_arg("risk=[\"High\",\"Low\"]").unwrap().1,
            FilterValue::List(vec!["High".into(), "Low".into()])
        );
        assert_eq!(
            parse_custom_arg("value=[10, 20]").unwrap().1,
            FilterValue::Range([10.0, 20.0])
        );
        assert_eq!(
            parse_custom_arg("owner=Ana Lima").unwrap(),
            ("owner".to_string(), FilterValue::Text("Ana Lima".into()))
        );
        assert!(parse_custom_arg("no-equals").is_err());
    }

    #[test]
    fn resolve_custom_matches_id_or_name() {
        let defined = vec![CustomFilter {
            id: "f-1".into(),
            name: "Risk".into(),
            kind: FilterKind::MultiSelect,
            field: ContractField::RiskLevel,
            options: Vec::new(),
            description: None,
        }];
        let wanted = vec![("risk".to_string(), FilterValue::Text("high".into()))];
        assert_eq!(resolve_custom(&defined, wanted).unwrap().len(), 1);
        let missing = vec![("nope".to_string(), FilterValue::Text("x".into()))];
        assert!(resolve_custom(&defined, missing).is_err());
    }

    #[tokio::test]
    async fn import_upserts_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "A", "region": "South"}}, {{"id": "B", "flowType": "RE"}}, {{"id": "A", "region": "North"}}]"#
        )
        .unwrap();
        let store = InMemoryStore::new();
        assert_eq!(import_contracts(&store, file.path()).await.unwrap(), 3);

        let all = store.all_contracts().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].region.as_deref(), Some("North"));
    }

    #[tokio::test]
    async fn sampling_an_empty_store_fails() {
        let store = InMemoryStore::new();
        let err = sample_contracts(&store, 5, today()).await.unwrap_err();
        assert!(err.is::<NoContracts>());
        assert_eq!(err.to_string(), "no contracts available");
    }

    #[tokio::test]
    async fn sample_covers_both_regions() {
        let records = (0..10)
            .map(|i| record(&format!("C{}", i), if i < 5 { "South" } else { "North" }))
            .collect();
        let store = InMemoryStore::with_contracts(records);
        let result = sample_contracts(&store, 2, today()).await.unwrap();

        assert_eq!(result.contracts.len(), 2);
        let mut regions: Vec<_> = result
            .contracts
            .iter()
            .filter_map(|r| r.region.as_deref())
            .collect();
        regions.sort();
        assert_eq!(regions, vec!["North", "South"]);
        assert_eq!(result.diversity.population, 10);
    }
}
