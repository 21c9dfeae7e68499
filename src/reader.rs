//! Registration field extraction ("reader").
//!
//! Sends a document's text to the LLM with the field-extraction prompt and
//! turns the reply into a [`ContractRecord`] ready for upsert. Unlike the
//! analysis pipeline there is no fallback: a reply that does not parse is
//! an error the caller reports.

use anyhow::{bail, Context, Result};
use tracing::info;

use contract_desk_core::analysis::ExtractedFields;
use contract_desk_core::chunk::clean_extracted_text;
use contract_desk_core::models::ContractRecord;

use crate::llm::{LlmClient, LlmError};
use crate::prompts;

/// Extract registration fields from already-extracted document text.
pub async fn read_fields(llm: &dyn LlmClient, text: &str) -> Result<ExtractedFields> {
    let cleaned = clean_extracted_text(text);
    if cleaned.trim().is_empty() {
        return Err(LlmError::Validation("document text is empty".to_string()).into());
    }
    let reply = llm
        .generate(&prompts::field_extraction(&cleaned))
        .await
        .context("field extraction request failed")?;
    let fields = ExtractedFields::parse(&reply).context("could not parse extracted fields")?;
    info!(model = llm.model_name(), supplier = ?fields.supplier, "extracted contract fields");
    Ok(fields)
}

/// Extract fields and build the contract record `contract_id`.
pub async fn read_contract(
    llm: &dyn LlmClient,
    contract_id: &str,
    text: &str,
) -> Result<ContractRecord> {
    if contract_id.trim().is_empty() {
        bail!("contract id must not be empty");
    }
    let fields = read_fields(llm, text).await?;
    Ok(fields.into_record(contract_id.trim()))
}
