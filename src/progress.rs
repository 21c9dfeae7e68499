//! Analysis progress reporting.
//!
//! Reports observable progress during `cdesk analyze` so users see which
//! document is being processed and which pipeline stage it is in. Progress
//! is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// Stage of the per-document analysis pipeline.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AnalysisStage {
    /// Reading the document bytes.
    Downloading,
    /// Extracting text from the document.
    Extracting,
    /// Cleaning and chunking the text.
    Preprocessing,
    /// Sending chunk `chunk` (1-based) of `chunks` to the LLM.
    Analyzing { chunk: usize, chunks: usize },
    /// Merging per-chunk findings.
    Consolidating,
    Completed,
    Error(String),
}

impl AnalysisStage {
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisStage::Downloading => "downloading",
            AnalysisStage::Extracting => "extracting",
            AnalysisStage::Preprocessing => "preprocessing",
            AnalysisStage::Analyzing { .. } => "analyzing",
            AnalysisStage::Consolidating => "consolidating",
            AnalysisStage::Completed => "completed",
            AnalysisStage::Error(_) => "error",
        }
    }

    /// Rough completion percentage for the document.
    pub fn percent(&self) -> u8 {
        match self {
            AnalysisStage::Downloading => 10,
            AnalysisStage::Extracting => 25,
            AnalysisStage::Preprocessing => 40,
            AnalysisStage::Analyzing { chunk, chunks } => {
                let done = (*chunk).min(*chunks) as f64 / (*chunks).max(1) as f64;
                (40.0 + done * 45.0).round() as u8
            }
            AnalysisStage::Consolidating => 90,
            AnalysisStage::Completed | AnalysisStage::Error(_) => 100,
        }
    }
}

/// A single progress event: document `index` (1-based) of `total` entered `stage`.
#[derive(Clone, Debug)]
pub struct AnalysisProgressEvent {
    pub document: String,
    pub index: usize,
    pub total: usize,
    pub stage: AnalysisStage,
}

/// Reports analysis progress. Implementations write to stderr (human or JSON).
pub trait AnalysisProgressReporter: Send + Sync {
    fn report(&self, event: AnalysisProgressEvent);
}

/// Human-friendly progress on stderr: "analyze [2/5] lease.pdf  analyzing 1/3  55%".
pub struct StderrProgress;

impl AnalysisProgressReporter for StderrProgress {
    fn report(&self, event: AnalysisProgressEvent) {
        let detail = match &event.stage {
            AnalysisStage::Analyzing { chunk, chunks } => format!("analyzing {}/{}", chunk, chunks),
            AnalysisStage::Error(message) => format!("error: {}", message),
            other => other.name().to_string(),
        };
        let line = format!(
            "analyze [{}/{}] {}  {}  {}%\n",
            event.index,
            event.total,
            event.document,
            detail,
            event.stage.percent()
        );
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl AnalysisProgressReporter for JsonProgress {
    fn report(&self, event: AnalysisProgressEvent) {
        let mut obj = serde_json::json!({
            "event": "progress",
            "document": event.document,
            "index": event.index,
            "total": event.total,
            "stage": event.stage.name(),
            "percent": event.stage.percent(),
        });
        match &event.stage {
            AnalysisStage::Analyzing { chunk, chunks } => {
                obj["chunk"] = (*chunk).into();
                obj["chunks"] = (*chunks).into();
            }
            AnalysisStage::Error(message) => obj["message"] = message.clone().into(),
            _ => {}
        }
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl AnalysisProgressReporter for NoProgress {
    fn report(&self, _event: AnalysisProgressEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn AnalysisProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
