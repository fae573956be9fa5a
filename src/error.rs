//! Error types for the paperbrief library.
//!
//! Failures are split by how far they are allowed to travel:
//!
//! * [`PaperError`]: **Fatal for one document**: extraction, condensation,
//!   structuring, or the artifact write failed. The document produces no
//!   artifact. Returned as `Err(PaperError)` from
//!   [`crate::process::Pipeline::process`]; never affects other documents.
//!
//! * [`ModelError`], [`RewriteError`], [`CompileError`]: **Stage-local**:
//!   a single collaborator call failed. The orchestrators decide per stage
//!   whether that is fatal (condensation, structuring) or a degradation
//!   (rewrite, compile).

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors for a single document run.
#[derive(Debug, Error)]
pub enum PaperError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found, or vanished before extraction.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Every extraction strategy failed on this PDF.
    #[error("Text extraction failed for '{path}': {detail}")]
    ExtractionFailed { path: PathBuf, detail: String },

    /// Extraction succeeded but produced no usable text (scanned PDF, etc.).
    #[error("No text could be extracted from '{path}'")]
    EmptyText { path: PathBuf },

    // ── Summarization errors ──────────────────────────────────────────────
    /// A per-chunk condensation request failed under the fail-fast policy.
    #[error("Condensation of chunk {chunk}/{total} failed: {source}")]
    CondensationFailed {
        chunk: usize,
        total: usize,
        #[source]
        source: ModelError,
    },

    /// The structuring request itself failed.
    #[error("Structuring request failed: {0}")]
    StructuringFailed(#[source] ModelError),

    /// The structuring response could not be parsed or failed validation.
    #[error("Structured summary rejected: {reason}")]
    InvalidSummary { reason: String, raw: String },

    // ── LLM configuration ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The template references a slot the renderer does not know.
    #[error("Template uses unknown placeholder '%%{slot}%%'")]
    UnknownTemplateSlot { slot: String },

    /// Could not create or write the output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Control flow ──────────────────────────────────────────────────────
    /// Shutdown was requested between two stages.
    #[error("Processing cancelled before {stage}")]
    Cancelled { stage: &'static str },

    // ── Config / watch errors ─────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The inbox watcher could not be started.
    #[error("Failed to watch '{path}': {detail}")]
    WatchFailed { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed language-model call, after retries.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The call did not finish within the configured timeout.
    #[error("model '{model}' timed out after {secs}s")]
    Timeout { model: String, secs: u64 },

    /// The provider returned an error.
    #[error("model '{model}' failed after {attempts} attempt(s): {detail}")]
    Provider {
        model: String,
        attempts: u32,
        detail: String,
    },

    /// The provider answered with nothing but whitespace.
    #[error("model '{model}' returned an empty response")]
    EmptyResponse { model: String },
}

/// A failed rewrite attempt by one provider.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// The provider is not configured (e.g. no API key).
    #[error("{provider} is unavailable: {reason}")]
    Unavailable {
        provider: &'static str,
        reason: String,
    },

    /// HTTP transport or status failure.
    #[error("{provider} request failed: {detail}")]
    Http {
        provider: &'static str,
        detail: String,
    },

    /// The provider answered, but not with one text per input.
    #[error("{provider} returned {got} text(s) for {expected} input(s)")]
    Mismatch {
        provider: &'static str,
        expected: usize,
        got: usize,
    },

    /// Language-model fallback failed.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// A failed typesetting run. Always non-fatal.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The compiler binary is not on PATH.
    #[error("{program} is not installed")]
    NotInstalled { program: String },

    /// The compiler ran and exited unsuccessfully.
    #[error("{program} exited with {code:?}: {stderr_tail}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr_tail: String,
    },

    /// The compiler exceeded the configured timeout.
    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    /// Spawning or waiting on the process failed.
    #[error("{program} could not be run: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl PaperError {
    /// The raw model response attached to a rejected structured summary.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            PaperError::InvalidSummary { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condensation_failure_display() {
        let e = PaperError::CondensationFailed {
            chunk: 2,
            total: 3,
            source: ModelError::Timeout {
                model: "claude-haiku".into(),
                secs: 120,
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("2/3"), "got: {msg}");
        assert!(msg.contains("120s"), "got: {msg}");
    }

    #[test]
    fn invalid_summary_keeps_raw_response() {
        let e = PaperError::InvalidSummary {
            reason: "missing field `question`".into(),
            raw: "{\"title\": \"x\"}".into(),
        };
        assert!(e.to_string().contains("question"));
        assert_eq!(e.raw_response(), Some("{\"title\": \"x\"}"));
        assert_eq!(PaperError::Internal("x".into()).raw_response(), None);
    }

    #[test]
    fn rewrite_mismatch_display() {
        let e = RewriteError::Mismatch {
            provider: "deepl",
            expected: 4,
            got: 1,
        };
        assert!(e.to_string().contains("1 text(s) for 4 input(s)"));
    }

    #[test]
    fn unknown_slot_display() {
        let e = PaperError::UnknownTemplateSlot {
            slot: "ABSTRACT".into(),
        };
        assert_eq!(
            e.to_string(),
            "Template uses unknown placeholder '%%ABSTRACT%%'"
        );
    }
}
