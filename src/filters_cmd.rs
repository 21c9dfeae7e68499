//! Custom filter management: infer a widget kind for a column with the LLM,
//! save, list and remove definitions.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use contract_desk_core::custom_filter::{
    parse_inferred_filter, ContractField, CustomFilter, FieldValue, FilterKind, InferredFilter,
};
use contract_desk_core::models::ContractRecord;
use contract_desk_core::store::ContractStore;

use crate::llm::LlmClient;
use crate::prompts::{self, FILTER_INFERENCE_SAMPLES};

/// A column name that maps to no contract field.
#[derive(Debug, Error)]
#[error("unknown column '{column}': expected one of {expected}")]
pub struct UnknownColumn {
    pub column: String,
    pub expected: String,
}

fn field_for_column(column: &str) -> Result<ContractField, UnknownColumn> {
    ContractField::from_column(column).ok_or_else(|| {
        let known: Vec<&str> = ContractField::ALL.iter().map(|f| f.column()).collect();
        UnknownColumn {
            column: column.to_string(),
            expected: known.join(", "),
        }
    })
}

fn display_value(value: FieldValue<'_>) -> Option<String> {
    match value {
        FieldValue::Text(t) => t.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string),
        FieldValue::Number(n) => n.map(|v| v.to_string()),
        FieldValue::Date(d) => d.map(|d| d.to_string()),
    }
}

/// Distinct non-empty values of `field`, in first-seen order.
pub fn sample_values(records: &[ContractRecord], field: ContractField, max: usize) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for record in records {
        if values.len() >= max {
            break;
        }
        if let Some(v) = display_value(field.value(record)) {
            if !values.contains(&v) {
                values.push(v);
            }
        }
    }
    values
}

/// A proposed filter for one column.
#[derive(Debug, Serialize)]
pub struct FilterSuggestion {
    pub column: String,
    pub samples: Vec<String>,
    #[serde(flatten)]
    pub inferred: InferredFilter,
}

/// Ask the LLM which filter kind suits `column`, based on stored values.
pub async fn infer_filter(
    llm: &dyn LlmClient,
    store: &dyn ContractStore,
    column: &str,
) -> Result<FilterSuggestion> {
    let field = field_for_column(column)?;
    let contracts = store.all_contracts().await?;
    let samples = sample_values(&contracts, field, FILTER_INFERENCE_SAMPLES);
    let reply = llm
        .generate(&prompts::filter_inference(field.column(), &samples))
        .await
        .context("filter inference request failed")?;
    let inferred = parse_inferred_filter(&reply)?;
    info!(column = field.column(), kind = inferred.kind.label(), "inferred filter kind");
    Ok(FilterSuggestion {
        column: field.column().to_string(),
        samples,
        inferred,
    })
}

/// Create and save a custom filter definition.
pub async fn add_filter(
    store: &dyn ContractStore,
    name: &str,
    kind: &str,
    column: &str,
    options: Vec<String>,
    description: Option<String>,
) -> Result<CustomFilter> {
    let name = name.trim();
    if name.is_empty() {
        bail!("filter name must not be empty");
    }
    let kind = FilterKind::from_label(kind)
        .with_context(|| format!("unknown filter kind: '{}'", kind))?;
    let filter = CustomFilter {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        kind,
        field: field_for_column(column)?,
        options,
        description: description.filter(|d| !d.trim().is_empty()),
    };
    store.save_custom_filter(&filter).await?;
    info!(id = %filter.id, name = %filter.name, "saved custom filter");
    Ok(filter)
}

/// Remove a custom filter by id. Errors when nothing was removed.
pub async fn remove_filter(store: &dyn ContractStore, id: &str) -> Result<()> {
    if !store.delete_custom_filter(id).await? {
        bail!("custom filter not found: {}", id);
    }
    Ok(())
}

/// Print filter definitions as a table.
pub fn print_filters(filters: &[CustomFilter]) {
    if filters.is_empty() {
        println!("No custom filters.");
        return;
    }
    println!("{:<38} {:<20} {:<14} {:<18} OPTIONS", "ID", "NAME", "KIND", "FIELD");
    for f in filters {
        println!(
            "{:<38} {:<20} {:<14} {:<18} {}",
            f.id,
            f.name,
            f.kind.label(),
            f.field.column(),
            f.options.join(", ")
        );
    }
}
