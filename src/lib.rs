//! # paperbrief
//!
//! Turn academic PDFs into one-page LaTeX summaries.
//!
//! Drop a paper into the inbox; a structured summary (title, summary,
//! contributions, limitations, one discussion question) appears in the
//! outbox as `.tex`, and as `.pdf` when `latexmk` is installed.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Detect     wait until the file stops growing
//!  ├─ 2. Extract    pdfium, then lopdf (spawn_blocking), sanitize
//!  ├─ 3. Chunk      3000-word windows, 200-word overlap (long papers only)
//!  ├─ 4. Condense   fast model, one call per chunk, joined in order
//!  ├─ 5. Structure  main model, one call, validated JSON record
//!  ├─ 6. Rewrite    DeepL, else fast model, else keep text as is
//!  ├─ 7. Render     escape + fill template, atomic write
//!  └─ 8. Compile    latexmk, best-effort
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paperbrief::{Pipeline, PipelineConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from ANTHROPIC_API_KEY / OPENAI_API_KEY / GEMINI_API_KEY
//!     let config = PipelineConfig::builder().outbox("PapersOut").build()?;
//!     let pipeline = Pipeline::from_config(config)?;
//!     let done = pipeline.process(Path::new("attention.pdf")).await?;
//!     println!("{} ({})", done.tex_path.display(), done.provenance);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paperbrief` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! paperbrief = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod shutdown;
pub mod watch;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ChunkFailurePolicy, PipelineConfig, PipelineConfigBuilder};
pub use document::Document;
pub use error::{CompileError, ModelError, PaperError, RewriteError};
pub use output::{
    DocumentStats, ProcessedDocument, Provenance, RewriteResult, StructuredSummary, SummaryItem,
};
pub use pipeline::chunk::{Chunk, Chunker};
pub use pipeline::llm::LanguageModel;
pub use pipeline::rewrite::{RewriteChain, Rewriter};
pub use process::{Pipeline, PipelineBuilder};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
pub use shutdown::Shutdown;
pub use watch::{watch, watch_until};
