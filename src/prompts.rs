//! Prompt templates sent to the LLM.
//!
//! Every prompt asks for a bare JSON object whose shape matches a parser in
//! `contract_desk_core::analysis` or `contract_desk_core::custom_filter`.

/// Maximum sample values shown to the model when inferring a filter type.
pub const FILTER_INFERENCE_SAMPLES: usize = 20;

const ANALYSIS_FORMAT: &str = r#"{
  "summary": "Executive summary of the contract in 2-3 sentences",
  "keyTerms": {
    "parties": ["Party 1", "Party 2"],
    "value": "Total value with currency, or 'Not specified'",
    "startDate": "Start date, or 'Not specified'",
    "endDate": "End date, or 'Not specified'",
    "duration": "Duration, or 'Indefinite'"
  },
  "riskAnalysis": {
    "highRisk": ["Critical risk"],
    "mediumRisk": ["Moderate risk"],
    "lowRisk": ["Point of attention"]
  },
  "clauses": {
    "payment": ["Payment clause description"],
    "termination": ["Termination clause description"],
    "liability": ["Liability clause description"],
    "other": ["Other relevant clauses"]
  },
  "recommendations": ["Specific recommendation"],
  "score": 85
}"#;

/// Full analysis of one contract text.
pub fn contract_analysis(contract_text: &str) -> String {
    format!(
        r#"# CONTRACT ANALYSIS

You are a contract analyst with deep experience in commercial law and risk
assessment. Analyze the contract below and produce a technical report.

## WHAT TO IDENTIFY
- Parties involved, the object of the contract, all monetary values,
  payment terms and adjustments, start/end dates and relevant deadlines.

## RISK CLASSIFICATION (mandatory)
- HIGH: abusive clauses, missing guarantees, disproportionate penalties,
  unlimited liability, missing essential protections.
- MEDIUM: ambiguous terms, tight or inadequate deadlines, problematic
  adjustment clauses, missing technical detail.
- LOW: minor wording issues, market-standard deadlines, adequate boilerplate.

## SCORE (0-100)
90-100 excellent; 70-89 good; 50-69 fair; 30-49 poor; 0-29 critical.

## RESPONSE FORMAT
Reply ONLY with valid JSON in exactly this structure:

{format}

Be objective. Do not invent information that is not in the contract.

## CONTRACT

{text}"#,
        format = ANALYSIS_FORMAT,
        text = contract_text
    )
}

/// Analysis of one section of a contract split into chunks.
pub fn chunk_analysis(chunk_text: &str, index: usize, total: usize) -> String {
    format!(
        r#"# CONTRACT SECTION ANALYSIS (part {part} of {total})

You are analyzing one section of a longer contract. Report only what this
section contains; make no assumptions about the rest of the contract.

Reply ONLY with valid JSON in exactly this structure:

{{
  "section": "Section name (e.g. Payment Clauses)",
  "keyPoints": ["Important point"],
  "risks": {{ "high": [], "medium": [], "low": [] }},
  "values": ["Monetary values found"],
  "dates": ["Dates found"],
  "parties": ["Parties mentioned"],
  "incomplete": false,
  "notes": "Additional observations"
}}

## SECTION

{text}"#,
        part = index + 1,
        total = total,
        text = chunk_text
    )
}

/// Merge per-section findings into one analysis.
pub fn consolidation(section_replies: &[String]) -> String {
    let sections = section_replies
        .iter()
        .enumerate()
        .map(|(i, reply)| format!("--- SECTION ANALYSIS {} ---\n{}", i + 1, reply))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        r#"# CONSOLIDATION OF CONTRACT ANALYSES

You received analyses of separate sections of one contract. Consolidate them
into a single, coherent final report. Remove duplicates, keep the most
severe classification when sections disagree, and score the contract as a
whole.

{sections}

Reply ONLY with valid JSON in exactly this structure:

{format}"#,
        sections = sections,
        format = ANALYSIS_FORMAT
    )
}

/// Extract registration fields from a contract.
pub fn field_extraction(contract_text: &str) -> String {
    format!(
        r#"You extract registration data from contracts. Read the contract text and
reply ONLY with a JSON object in this format, with no extra text:

{{
  "supplier": string (contracted supplier),
  "contracting_party": string (contracting company),
  "flow_type": string (one of "RE", "real state", "FI", "proposal", "Engineering", "RC"),
  "contract_value": number (total contract value, digits only),
  "payment_value": number (value of each payment or installment, digits only),
  "installment_count": number (number of installments),
  "location": {{ "state": string, "city": string }},
  "due_date": string (final date, ISO format, e.g. "2025-12-31"),
  "responsible_area": string (area responsible for the contract),
  "installment_due_dates": string[] (ISO dates),
  "penalty": number (penalty amount, digits only)
}}

Use null for anything the contract does not state.

CONTRACT TEXT:
{text}"#,
        text = contract_text
    )
}

/// Ask which filter widget suits a column, given sample values.
pub fn filter_inference(column: &str, samples: &[String]) -> String {
    let shown: Vec<&String> = samples.iter().take(FILTER_INFERENCE_SAMPLES).collect();
    let samples_json = serde_json::to_string_pretty(&shown).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"You design filters for a contract dashboard. Table: contracts.
Column: {column}

Sample values:
{samples}

Choose the most suitable filter type: one of "dropdown", "multi_select",
"input", "text", "number", "range", "date", "date_range", "checkbox".
Reply ONLY with JSON:

{{ "filter_type": "...", "config": {{ "options": [], "min": null, "max": null, "placeholder": "" }} }}"#,
        column = column,
        samples = samples_json
    )
}
