//! Document analysis pipeline.
//!
//! For each document: read → extract text → require a minimum amount of
//! text → clean and chunk → analyze. A document that fits in one chunk gets
//! a single analysis prompt; longer documents are analyzed section by
//! section and the findings consolidated by a final prompt. The reply is
//! parsed into a [`ContractAnalysis`], falling back to a placeholder that
//! flags the document for manual review when anything fails.
//!
//! Batches run sequentially and never abort on one document's failure.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use contract_desk_core::analysis::{BatchSummary, ChunkFindings, ContractAnalysis};
use contract_desk_core::chunk::{process_text, text_hash, validate_chunks};
use contract_desk_core::models::StoredAnalysis;
use contract_desk_core::store::ContractStore;

use crate::config::ChunkingConfig;
use crate::extract::{content_type_for_path, extract_text};
use crate::llm::LlmClient;
use crate::progress::{AnalysisProgressEvent, AnalysisProgressReporter, AnalysisStage};
use crate::prompts;

/// Minimum extracted characters for a document to be worth analyzing.
pub const MIN_TEXT_CHARS: usize = 100;

/// A document already loaded into memory.
pub struct DocumentInput<'a> {
    pub name: &'a str,
    pub bytes: &'a [u8],
    pub content_type: &'a str,
    pub contract_id: Option<&'a str>,
}

/// Results of a batch run.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub results: Vec<StoredAnalysis>,
    pub summary: BatchSummary,
    pub average_score: Option<f64>,
}

struct Tracker<'a> {
    reporter: &'a dyn AnalysisProgressReporter,
    document: &'a str,
    index: usize,
    total: usize,
}

impl Tracker<'_> {
    fn stage(&self, stage: AnalysisStage) {
        self.reporter.report(AnalysisProgressEvent {
            document: self.document.to_string(),
            index: self.index,
            total: self.total,
            stage,
        });
    }
}

/// Outcome of the fallible part of the pipeline: an analysis, or the
/// reason no analysis could be produced.
enum Produced {
    Analysis(ContractAnalysis),
    Unparseable(String),
}

/// Analyze one in-memory document. Always returns a stored analysis;
/// failures carry a fallback analysis and `error`.
pub async fn analyze_document(
    llm: &dyn LlmClient,
    chunking: &ChunkingConfig,
    doc: DocumentInput<'_>,
    position: (usize, usize),
    reporter: &dyn AnalysisProgressReporter,
) -> StoredAnalysis {
    let started = Instant::now();
    let tracker = Tracker {
        reporter,
        document: doc.name,
        index: position.0,
        total: position.1,
    };

    let mut text_digest = text_hash("");
    let result = run_pipeline(llm, chunking, &doc, &tracker, &mut text_digest).await;

    let (analysis, error) = match result {
        Ok(Produced::Analysis(analysis)) => {
            tracker.stage(AnalysisStage::Completed);
            (analysis, None)
        }
        Ok(Produced::Unparseable(reason)) => {
            warn!(document = doc.name, %reason, "unparseable analysis reply");
            tracker.stage(AnalysisStage::Error(reason.clone()));
            (ContractAnalysis::fallback(&reason), Some(reason))
        }
        Err(e) => {
            let reason = format!("{:#}", e);
            warn!(document = doc.name, error = %reason, "document analysis failed");
            tracker.stage(AnalysisStage::Error(reason.clone()));
            (ContractAnalysis::fallback(&reason), Some(reason))
        }
    };

    StoredAnalysis {
        id: uuid::Uuid::new_v4().to_string(),
        contract_id: doc.contract_id.map(str::to_string),
        file_name: doc.name.to_string(),
        text_hash: text_digest,
        risk_bucket: analysis.risk_bucket(),
        analysis,
        processing_ms: started.elapsed().as_millis() as u64,
        error,
        created_at: Utc::now(),
    }
}

async fn run_pipeline(
    llm: &dyn LlmClient,
    chunking: &ChunkingConfig,
    doc: &DocumentInput<'_>,
    tracker: &Tracker<'_>,
    text_digest: &mut String,
) -> Result<Produced> {
    tracker.stage(AnalysisStage::Extracting);
    let text = extract_text(doc.bytes, doc.content_type)?;
    let chars = text.trim().chars().count();
    if chars < MIN_TEXT_CHARS {
        anyhow::bail!(
            "document text too short for analysis ({} chars, need {})",
            chars,
            MIN_TEXT_CHARS
        );
    }

    tracker.stage(AnalysisStage::Preprocessing);
    let processed = process_text(doc.contract_id.unwrap_or(doc.name), &text, chunking.max_tokens);
    *text_digest = text_hash(&processed.cleaned_text);
    info!(
        document = doc.name,
        chunks = processed.metadata.total_chunks,
        tokens = processed.metadata.estimated_tokens,
        "preprocessed document"
    );
    if processed.chunks.len() > 1
        && !validate_chunks(&processed.chunks, chunking.min_tokens, chunking.max_tokens)
    {
        warn!(document = doc.name, "some chunks fall outside the configured token bounds");
    }

    let reply = match processed.chunks.len() {
        0 => anyhow::bail!("document has no text left after cleaning"),
        1 => {
            tracker.stage(AnalysisStage::Analyzing { chunk: 1, chunks: 1 });
            llm.generate(&prompts::contract_analysis(&processed.cleaned_text))
                .await?
        }
        total => {
            let mut sections = Vec::with_capacity(total);
            for chunk in &processed.chunks {
                tracker.stage(AnalysisStage::Analyzing {
                    chunk: chunk.chunk_index + 1,
                    chunks: total,
                });
                let prompt = prompts::chunk_analysis(&chunk.text, chunk.chunk_index, total);
                match llm.generate(&prompt).await {
                    Ok(reply) => sections.push(canonical_findings(&reply)),
                    Err(e) => warn!(
                        document = doc.name,
                        chunk = chunk.chunk_index,
                        error = %e,
                        "chunk analysis failed; skipping section"
                    ),
                }
            }
            if sections.is_empty() {
                anyhow::bail!("every section analysis failed");
            }
            tracker.stage(AnalysisStage::Consolidating);
            llm.generate(&prompts::consolidation(&sections)).await?
        }
    };

    Ok(match ContractAnalysis::parse(&reply) {
        Ok(analysis) => Produced::Analysis(analysis),
        Err(e) => Produced::Unparseable(e.to_string()),
    })
}

/// Re-serialize a section reply as compact JSON when it parses; pass the
/// raw reply through otherwise.
fn canonical_findings(reply: &str) -> String {
    ChunkFindings::parse(reply)
        .ok()
        .and_then(|findings| serde_json::to_string(&findings).ok())
        .unwrap_or_else(|| reply.trim().to_string())
}

/// Analyze files from disk sequentially.
pub async fn analyze_files(
    llm: &dyn LlmClient,
    chunking: &ChunkingConfig,
    paths: &[&Path],
    contract_id: Option<&str>,
    reporter: &dyn AnalysisProgressReporter,
) -> BatchReport {
    let total = paths.len();
    let mut summary = BatchSummary::default();
    let mut results = Vec::with_capacity(total);

    for (i, path) in paths.iter().enumerate() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        reporter.report(AnalysisProgressEvent {
            document: name.clone(),
            index: i + 1,
            total,
            stage: AnalysisStage::Downloading,
        });

        let content_type = content_type_for_path(path).unwrap_or("application/octet-stream");
        let stored = match tokio::fs::read(path).await {
            Ok(bytes) => {
                let doc = DocumentInput {
                    name: &name,
                    bytes: &bytes,
                    content_type,
                    contract_id,
                };
                analyze_document(llm, chunking, doc, (i + 1, total), reporter).await
            }
            Err(e) => {
                let reason = format!("failed to read {}: {}", path.display(), e);
                warn!(%reason, "skipping document");
                reporter.report(AnalysisProgressEvent {
                    document: name.clone(),
                    index: i + 1,
                    total,
                    stage: AnalysisStage::Error(reason.clone()),
                });
                let analysis = ContractAnalysis::fallback(&reason);
                StoredAnalysis {
                    id: uuid::Uuid::new_v4().to_string(),
                    contract_id: contract_id.map(str::to_string),
                    file_name: name.clone(),
                    text_hash: text_hash(""),
                    risk_bucket: analysis.risk_bucket(),
                    analysis,
                    processing_ms: 0,
                    error: Some(reason),
                    created_at: Utc::now(),
                }
            }
        };

        match stored.error {
            None => summary.record_success(stored.analysis.score),
            Some(_) => summary.record_failure(),
        }
        results.push(stored);
    }

    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "batch analysis finished"
    );
    BatchReport {
        average_score: summary.average_score(),
        results,
        summary,
    }
}

/// Persist every analysis of a batch.
pub async fn save_report(store: &dyn ContractStore, report: &BatchReport) -> Result<()> {
    for stored in &report.results {
        store.save_analysis(stored).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MIME_TEXT;
    use crate::llm::LlmError;
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use contract_desk_core::analysis::RiskBucket;
    use std::sync::Mutex;

    /// Replays canned replies in order and records every prompt.
    struct ScriptedClient {
        replies: Mutex<Vec<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(LlmError::EmptyResponse))
        }
    }

    const GOOD_REPLY: &str = r#"```json
{"summary": "Supply agreement", "riskAnalysis": {"mediumRisk": ["Short notice period"]}, "score": 74}
```"#;

    fn contract_text() -> String {
        "CLAUSE 1. The supplier shall deliver office equipment every month. \
         CLAUSE 2. Payment is due thirty days after each delivery."
            .repeat(2)
    }

    fn chunking(max_tokens: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_tokens,
            min_tokens: 1,
        }
    }

    async fn run(client: &ScriptedClient, text: &str, max_tokens: usize) -> StoredAnalysis {
        let doc = DocumentInput {
            name: "lease.txt",
            bytes: text.as_bytes(),
            content_type: MIME_TEXT,
            contract_id: Some("CT-1"),
        };
        analyze_document(client, &chunking(max_tokens), doc, (1, 1), &NoProgress).await
    }

    #[tokio::test]
    async fn single_chunk_document_uses_one_prompt() {
        let client = ScriptedClient::new(vec![Ok(GOOD_REPLY.to_string())]);
        let stored = run(&client, &contract_text(), 1800).await;

        assert!(stored.error.is_none());
        assert_eq!(stored.analysis.score, 74);
        assert_eq!(stored.risk_bucket, RiskBucket::Medium);
        assert_eq!(stored.contract_id.as_deref(), Some("CT-1"));
        assert_eq!(stored.text_hash.len(), 64);
        assert_eq!(client.prompts().len(), 1);
    }

    #[tokio::test]
    async fn null_fields_in_reply_keep_the_analysis() {
        let reply = r#"{"summary": "Supply agreement", "keyTerms": {"value": null},
            "recommendations": null, "score": 80}"#;
        let client = ScriptedClient::new(vec![Ok(reply.to_string())]);
        let stored = run(&client, &contract_text(), 1800).await;

        assert!(stored.error.is_none());
        assert_eq!(stored.analysis.summary, "Supply agreement");
        assert_eq!(stored.analysis.score, 80);
        assert_eq!(stored.risk_bucket, RiskBucket::Low);
    }

    #[tokio::test]
    async fn short_text_fails_without_calling_llm() {
        let client = ScriptedClient::new(vec![]);
        let stored = run(&client, "Too short.", 1800).await;

        assert!(stored.error.as_deref().unwrap().contains("too short"));
        assert_eq!(stored.analysis.score, 0);
        assert_eq!(stored.risk_bucket, RiskBucket::High);
        assert!(client.prompts().is_empty());
    }

    #[tokio::test]
    async fn long_document_is_analyzed_in_sections_then_consolidated() {
        let text = format!("{}\n\n{}", contract_text(), contract_text());
        let section = r#"{"section": "Delivery", "keyPoints": ["monthly"]}"#;
        let client = ScriptedClient::new(vec![
            Ok(section.to_string()),
            Ok("not json at all".to_string()),
            Ok(GOOD_REPLY.to_string()),
        ]);
        let stored = run(&client, &text, 70).await;

        assert!(stored.error.is_none(), "{:?}", stored.error);
        let prompts = client.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("part 1 of 2"));
        assert!(prompts[2].contains("CONSOLIDATION"));
        assert!(prompts[2].contains("\"keyPoints\":[\"monthly\"]"));
        assert!(prompts[2].contains("not json at all"));
    }

    #[tokio::test]
    async fn unparseable_reply_falls_back() {
        let client = ScriptedClient::new(vec![Ok("I cannot analyze this".to_string())]);
        let stored = run(&client, &contract_text(), 1800).await;

        assert!(stored.error.is_some());
        assert_eq!(stored.analysis.score, 0);
        assert_eq!(stored.analysis.risk_analysis.high_risk.len(), 1);
    }

    #[tokio::test]
    async fn llm_error_is_recorded() {
        let client = ScriptedClient::new(vec![Err(LlmError::Api {
            status: 400,
            body: "bad request".into(),
        })]);
        let stored = run(&client, &contract_text(), 1800).await;
        assert!(stored.error.as_deref().unwrap().contains("400"));
    }

    #[tokio::test]
    async fn batch_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.txt");
        let short = dir.path().join("short.txt");
        let missing = dir.path().join("missing.txt");
        std::fs::write(&good, contract_text()).unwrap();
        std::fs::write(&short, "tiny").unwrap();

        let client = ScriptedClient::new(vec![Ok(GOOD_REPLY.to_string())]);
        let paths = [good.as_path(), short.as_path(), missing.as_path()];
        let report = analyze_files(&client, &chunking(1800), &paths, None, &NoProgress).await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.summary.succeeded, 1);
        assert_eq!(report.summary.failed, 2);
        assert_eq!(report.average_score, Some(74.0));
        assert_eq!(report.results[0].file_name, "good.txt");
    }
}
