//! Progress-callback trait for per-document pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::process::PipelineBuilder::progress`] to receive events as each
//! document moves through extraction, condensation, structuring, rewrite,
//! rendering, and compilation.
//!
//! The trait is `Send + Sync`: in watch mode several documents run at once,
//! and chunk events may arrive out of order when condensation runs
//! concurrently.
//!
//! # Example
//!
//! ```rust
//! use paperbrief::{PipelineProgressCallback, Stage};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct ChunkCounter(AtomicUsize);
//!
//! impl PipelineProgressCallback for ChunkCounter {
//!     fn on_chunk_complete(&self, _doc: &str, chunk: usize, total: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("chunk {chunk}/{total} condensed");
//!     }
//! }
//! ```

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Named pipeline stages, reported through [`PipelineProgressCallback::on_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extracting,
    Condensing,
    Structuring,
    Rewriting,
    Rendering,
    Compiling,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extracting => "extracting",
            Stage::Condensing => "condensing",
            Stage::Structuring => "structuring",
            Stage::Rewriting => "rewriting",
            Stage::Rendering => "rendering",
            Stage::Compiling => "compiling",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the pipeline as it processes a document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `doc` is always the document name (file stem).
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once when a document enters the pipeline.
    fn on_document_start(&self, doc: &str) {
        let _ = doc;
    }

    /// Called when a document enters a new stage.
    fn on_stage(&self, doc: &str, stage: Stage) {
        let _ = (doc, stage);
    }

    /// Called before a condensation request is sent.
    ///
    /// # Arguments
    /// * `chunk`: 1-indexed chunk number
    /// * `total`: number of chunks in the document
    fn on_chunk_start(&self, doc: &str, chunk: usize, total: usize) {
        let _ = (doc, chunk, total);
    }

    /// Called when a chunk has been condensed.
    fn on_chunk_complete(&self, doc: &str, chunk: usize, total: usize) {
        let _ = (doc, chunk, total);
    }

    /// Called when a chunk's condensation fails after all retries.
    fn on_chunk_error(&self, doc: &str, chunk: usize, total: usize, error: &str) {
        let _ = (doc, chunk, total, error);
    }

    /// Called once the `.tex` artifact is written.
    fn on_document_complete(&self, doc: &str, tex_path: &Path) {
        let _ = (doc, tex_path);
    }

    /// Called when the document fails and produces no artifact.
    fn on_document_failed(&self, doc: &str, error: &str) {
        let _ = (doc, error);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Shared callback handle as stored by the pipeline.
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl PipelineProgressCallback for Recorder {
        fn on_stage(&self, doc: &str, stage: Stage) {
            self.events.lock().unwrap().push(format!("{doc}:{stage}"));
        }

        fn on_chunk_error(&self, doc: &str, chunk: usize, total: usize, error: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{doc}:chunk {chunk}/{total}: {error}"));
        }
    }

    #[test]
    fn noop_accepts_every_event() {
        let cb = NoopProgressCallback;
        cb.on_document_start("a");
        cb.on_stage("a", Stage::Extracting);
        cb.on_chunk_start("a", 1, 2);
        cb.on_chunk_complete("a", 1, 2);
        cb.on_chunk_error("a", 2, 2, "boom");
        cb.on_document_complete("a", Path::new("/out/a.tex"));
        cb.on_document_failed("a", "boom");
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Arc::new(Recorder::default());
        let cb: ProgressCallback = rec.clone();
        cb.on_stage("paper", Stage::Condensing);
        cb.on_chunk_error("paper", 2, 3, "timeout");
        cb.on_document_start("paper");
        let events = rec.events.lock().unwrap();
        assert_eq!(
            *events,
            vec!["paper:condensing", "paper:chunk 2/3: timeout"]
        );
    }
}
