//! Text cleanup and token-bounded chunking for LLM prompts.
//!
//! Extracted document text is first passed through
//! [`clean_extracted_text`], which strips page furniture left behind by PDF
//! extraction. [`chunk_text`] then splits the cleaned text into
//! [`TextChunk`]s no larger than `max_tokens`.
//!
//! # Algorithm
//!
//! 1. Split text on `\n\n` paragraph boundaries.
//! 2. Accumulate paragraphs into a buffer until adding the next one would
//!    exceed `max_tokens`; then flush the buffer as a chunk.
//! 3. A paragraph that alone exceeds `max_tokens` is split into sentences
//!    (terminated by `.`, `!` or `?`) which accumulate the same way.
//! 4. A sentence that alone exceeds `max_tokens` is hard-split at the last
//!    whitespace before the limit.
//!
//! Token counts are estimated at 4 characters per token.
//!
//! # Example
//!
//! ```rust
//! use contract_desk_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("CT-1", "Hello world.\n\nSecond paragraph.", 1800);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_index, 0);
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Default upper bound on tokens per chunk.
pub const DEFAULT_MAX_TOKENS: usize = 1800;
/// Default lower bound used by [`validate_chunks`].
pub const DEFAULT_MIN_TOKENS: usize = 200;

static PAGE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(p[áa]gina\s+\d+\s+de\s+\d+|page\s+\d+\s+of\s+\d+)")
        .expect("page marker pattern is valid")
});

static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]*").expect("sentence pattern is valid"));

/// A contiguous piece of document text sized for one prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextChunk {
    pub id: String,
    pub contract_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub tokens: usize,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// Estimated token count: characters divided by four, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Hex-encoded SHA-256 of `text`.
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn is_furniture_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    if ["confidential", "confidencial", "proprietary", "copyright"]
        .iter()
        .any(|word| lower.contains(word))
    {
        return true;
    }
    let page_number = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    match line.split_once('/') {
        Some((n, m)) => page_number(n.trim()) && page_number(m.trim()),
        None => page_number(line),
    }
}

/// Strip extraction noise from document text.
///
/// Normalizes line endings, removes control characters, collapses runs of
/// spaces and tabs, removes "page N of M" markers, and drops lines that are
/// bare page numbers or confidentiality/copyright notices. Lines are trimmed
/// and any run of blank lines becomes a single paragraph break.
pub fn clean_extracted_text(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let printable: String = normalized
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    let unmarked = PAGE_MARKER.replace_all(&printable, "");

    let mut out = String::with_capacity(unmarked.len());
    let mut pending_break = false;
    for line in unmarked.lines() {
        let collapsed = line
            .split([' ', '\t'])
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if collapsed.is_empty() {
            pending_break = true;
            continue;
        }
        if is_furniture_line(&collapsed) {
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_break { "\n\n" } else { "\n" });
        }
        out.push_str(&collapsed);
        pending_break = false;
    }
    out
}

struct ChunkBuilder<'a> {
    contract_id: &'a str,
    max_tokens: usize,
    buf: String,
    chunks: Vec<TextChunk>,
}

impl ChunkBuilder<'_> {
    fn append(&mut self, piece: &str, separator: &str) {
        if !self.buf.is_empty() {
            let combined = self.buf.chars().count()
                + separator.chars().count()
                + piece.chars().count();
            if combined.div_ceil(CHARS_PER_TOKEN) > self.max_tokens {
                self.flush();
            } else {
                self.buf.push_str(separator);
            }
        }
        self.buf.push_str(piece);
    }

    fn flush(&mut self) {
        let text = self.buf.trim();
        if !text.is_empty() {
            let chunk = make_chunk(self.contract_id, self.chunks.len(), text);
            self.chunks.push(chunk);
        }
        self.buf.clear();
    }

    fn finish(mut self) -> Vec<TextChunk> {
        self.flush();
        self.chunks
    }
}

/// Split `text` into chunks of at most `max_tokens` estimated tokens.
///
/// Empty or whitespace-only text yields no chunks. Chunk indices are
/// contiguous from 0.
pub fn chunk_text(contract_id: &str, text: &str, max_tokens: usize) -> Vec<TextChunk> {
    let max_tokens = max_tokens.max(1);
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    let mut builder = ChunkBuilder {
        contract_id,
        max_tokens,
        buf: String::new(),
        chunks: Vec::new(),
    };

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if estimate_tokens(para) <= max_tokens {
            builder.append(para, "\n\n");
            continue;
        }
        builder.flush();
        for sentence in SENTENCE.find_iter(para).map(|m| m.as_str().trim()) {
            if sentence.is_empty() {
                continue;
            }
            if estimate_tokens(sentence) <= max_tokens {
                builder.append(sentence, " ");
                continue;
            }
            builder.flush();
            for piece in hard_split(sentence, max_chars) {
                builder.append(piece, " ");
            }
        }
        builder.flush();
    }

    builder.finish()
}

/// Split `text` into pieces of at most `max_chars` characters, preferring
/// to break after whitespace.
fn hard_split(text: &str, max_chars: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let limit = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let split_at = if limit < remaining.len() {
            remaining[..limit]
                .rfind(char::is_whitespace)
                .filter(|&pos| pos > 0)
                .unwrap_or(limit)
        } else {
            limit
        };
        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        remaining = remaining[split_at..].trim_start();
    }
    pieces
}

fn make_chunk(contract_id: &str, index: usize, text: &str) -> TextChunk {
    TextChunk {
        id: Uuid::new_v4().to_string(),
        contract_id: contract_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        tokens: estimate_tokens(text),
        hash: text_hash(text),
    }
}

/// Size statistics for a processed document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextMetadata {
    pub original_length: usize,
    pub cleaned_length: usize,
    pub total_chunks: usize,
    pub average_chunk_tokens: usize,
    pub estimated_tokens: usize,
}

/// A document after cleanup and chunking.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedText {
    pub original_text: String,
    pub cleaned_text: String,
    pub chunks: Vec<TextChunk>,
    pub metadata: TextMetadata,
}

/// Clean `raw` and chunk the result.
pub fn process_text(contract_id: &str, raw: &str, max_tokens: usize) -> ProcessedText {
    let cleaned = clean_extracted_text(raw);
    let chunks = chunk_text(contract_id, &cleaned, max_tokens);
    let average_chunk_tokens = if chunks.is_empty() {
        0
    } else {
        let total: usize = chunks.iter().map(|c| c.tokens).sum();
        (total as f64 / chunks.len() as f64).round() as usize
    };
    let metadata = TextMetadata {
        original_length: raw.chars().count(),
        cleaned_length: cleaned.chars().count(),
        total_chunks: chunks.len(),
        average_chunk_tokens,
        estimated_tokens: estimate_tokens(&cleaned),
    };
    ProcessedText {
        original_text: raw.to_string(),
        cleaned_text: cleaned,
        chunks,
        metadata,
    }
}

/// True when every chunk's token count lies within `[min_tokens, max_tokens]`.
pub fn validate_chunks(chunks: &[TextChunk], min_tokens: usize, max_tokens: usize) -> bool {
    chunks
        .iter()
        .all(|c| c.tokens >= min_tokens && c.tokens <= max_tokens)
}
