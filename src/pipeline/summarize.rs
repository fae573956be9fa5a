//! Two-tier summarization: per-chunk condensation, then one structuring pass.
//!
//! ```text
//! text ──▶ Chunker ──▶ [chunk 1..N] ──▶ fast model (tier 1, per chunk)
//!                                          │
//!                       join in index order ▼
//!                                      main model (tier 2, once) ──▶ StructuredSummary
//! ```
//!
//! Documents at or below the chunk threshold skip tier 1: the structuring
//! request runs directly on the extracted text.
//!
//! Condensation results are re-sorted by chunk index before joining, so the
//! structuring input is identical whatever order the requests complete in.
//! A failed chunk either fails the document ([`ChunkFailurePolicy::FailFast`])
//! or is dropped from the join ([`ChunkFailurePolicy::Substitute`]); chunk
//! content is never invented.

use crate::config::{ChunkFailurePolicy, PipelineConfig};
use crate::document::word_count;
use crate::error::{ModelError, PaperError};
use crate::output::{StructuredSummary, SummaryItem};
use crate::pipeline::chunk::{Chunk, Chunker};
use crate::pipeline::llm::LanguageModel;
use crate::progress::{NoopProgressCallback, ProgressCallback, Stage};
use crate::prompts;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Inclusive bounds on the list fields of a valid summary.
pub const CONTRIBUTIONS_RANGE: (usize, usize) = (2, 4);
pub const LIMITATIONS_RANGE: (usize, usize) = (1, 3);

/// Separator placed between condensations in the structuring input.
pub const CONDENSATION_SEPARATOR: &str = "\n\n";

/// Raw responses longer than this are truncated in logs.
const RAW_LOG_LIMIT: usize = 2000;

/// One chunk's tier-1 output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condensation {
    /// 0-based chunk index.
    pub index: usize,
    pub text: String,
}

/// Result of [`Summarizer::summarize`].
#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    pub summary: StructuredSummary,
    /// Chunks the document was split into (1 when tier 1 was skipped).
    pub chunk_count: usize,
    /// Condensation requests issued.
    pub condensation_calls: usize,
}

/// Drives both tiers for one document at a time.
pub struct Summarizer {
    fast: Arc<dyn LanguageModel>,
    main: Arc<dyn LanguageModel>,
    chunker: Chunker,
    policy: ChunkFailurePolicy,
    concurrency: usize,
    progress: ProgressCallback,
}

impl Summarizer {
    pub fn new(fast: Arc<dyn LanguageModel>, main: Arc<dyn LanguageModel>, chunker: Chunker) -> Self {
        Self {
            fast,
            main,
            chunker,
            policy: ChunkFailurePolicy::default(),
            concurrency: 1,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    /// Build from config: chunk parameters, failure policy and concurrency.
    pub fn from_config(
        fast: Arc<dyn LanguageModel>,
        main: Arc<dyn LanguageModel>,
        config: &PipelineConfig,
    ) -> Result<Self, PaperError> {
        let chunker = Chunker::new(config.chunk_threshold, config.chunk_size, config.chunk_overlap)?;
        Ok(Self::new(fast, main, chunker)
            .with_policy(config.chunk_failure_policy)
            .with_concurrency(config.condense_concurrency))
    }

    pub fn with_policy(mut self, policy: ChunkFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Turn extracted text into a validated [`StructuredSummary`].
    ///
    /// `doc` names the document in logs and progress events and is the
    /// fallback title when the model does not supply one.
    pub async fn summarize(&self, doc: &str, text: &str) -> Result<SummaryOutcome, PaperError> {
        let chunks = self.chunker.chunk(text);
        let chunk_count = chunks.len();

        // ── Tier 1: condensation (skipped for short documents) ───────────
        let (prompt, condensation_calls) = if self.chunker.needs_chunking(word_count(text)) {
            self.progress.on_stage(doc, Stage::Condensing);
            info!(document = doc, chunks = chunk_count, "condensing chunks");
            let condensations = self.condense(doc, &chunks).await?;
            let blob = join_condensations(condensations);
            (prompts::consolidation_prompt(&blob, doc), chunk_count)
        } else {
            debug!(document = doc, "below chunk threshold, single structuring pass");
            (prompts::summary_prompt(text, doc), 0)
        };

        // ── Tier 2: structuring ──────────────────────────────────────────
        self.progress.on_stage(doc, Stage::Structuring);
        let raw = self
            .main
            .complete(prompts::SUMMARIZER_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(PaperError::StructuringFailed)?;

        let summary = parse_structured(&raw, doc).inspect_err(|e| {
            warn!(
                document = doc,
                model = self.main.name(),
                raw = %truncate(&raw, RAW_LOG_LIMIT),
                "structured summary rejected: {}",
                e
            );
        })?;

        info!(
            document = doc,
            contributions = summary.contributions.len(),
            limitations = summary.limitations.len(),
            "summary structured"
        );
        Ok(SummaryOutcome {
            summary,
            chunk_count,
            condensation_calls,
        })
    }

    /// Run tier 1 over `chunks`. Returns condensations sorted by chunk index.
    pub async fn condense(&self, doc: &str, chunks: &[Chunk<'_>]) -> Result<Vec<Condensation>, PaperError> {
        let total = chunks.len();
        let tasks: Vec<_> = chunks
            .iter()
            .map(|chunk| {
                let fast = Arc::clone(&self.fast);
                let progress = Arc::clone(&self.progress);
                let prompt = prompts::chunk_prompt(chunk.text, chunk.index + 1, total);
                let index = chunk.index;
                async move {
                    progress.on_chunk_start(doc, index + 1, total);
                    let result = fast.complete(prompts::SUMMARIZER_SYSTEM_PROMPT, &prompt).await;
                    (index, result)
                }
            })
            .collect();
        let mut results = stream::iter(tasks).buffer_unordered(self.concurrency);

        let mut condensations = Vec::with_capacity(total);
        let mut first_error: Option<(usize, ModelError)> = None;

        while let Some((index, result)) = results.next().await {
            match result {
                Ok(text) => {
                    debug!(document = doc, chunk = index + 1, total, "chunk condensed");
                    self.progress.on_chunk_complete(doc, index + 1, total);
                    condensations.push(Condensation { index, text });
                }
                Err(e) => {
                    self.progress.on_chunk_error(doc, index + 1, total, &e.to_string());
                    match self.policy {
                        ChunkFailurePolicy::FailFast => {
                            return Err(PaperError::CondensationFailed {
                                chunk: index + 1,
                                total,
                                source: e,
                            });
                        }
                        ChunkFailurePolicy::Substitute => {
                            warn!(
                                document = doc,
                                chunk = index + 1,
                                total,
                                "chunk condensation failed, continuing without it: {}",
                                e
                            );
                            if first_error.is_none() {
                                first_error = Some((index, e));
                            }
                        }
                    }
                }
            }
        }

        if condensations.is_empty() {
            if let Some((index, source)) = first_error {
                return Err(PaperError::CondensationFailed {
                    chunk: index + 1,
                    total,
                    source,
                });
            }
        }

        condensations.sort_by_key(|c| c.index);
        Ok(condensations)
    }
}

/// Join condensations in chunk-index order, whatever order they arrive in.
pub fn join_condensations(mut condensations: Vec<Condensation>) -> String {
    condensations.sort_by_key(|c| c.index);
    condensations
        .into_iter()
        .map(|c| c.text)
        .collect::<Vec<_>>()
        .join(CONDENSATION_SEPARATOR)
}

// ── Structured record parsing ────────────────────────────────────────────

/// Matches a response wrapped entirely in a markdown code fence.
static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*\n?(.*?)\n?\s*```$").unwrap());

/// The record as the model sends it: everything optional so missing fields
/// can be reported by name.
#[derive(Debug, Deserialize)]
struct RawSummary {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    contributions: Option<Vec<SummaryItem>>,
    #[serde(default)]
    limitations: Option<Vec<SummaryItem>>,
    #[serde(default)]
    question: Option<String>,
}

/// Parse and validate a structuring response.
///
/// Tolerates code fences and prose around the JSON object. A missing or
/// blank title is replaced by `fallback_title`; every other field must be
/// present and non-empty, with 2–4 contributions and 1–3 limitations.
pub fn parse_structured(raw: &str, fallback_title: &str) -> Result<StructuredSummary, PaperError> {
    let invalid = |reason: String| PaperError::InvalidSummary {
        reason,
        raw: raw.to_string(),
    };

    let record: RawSummary = extract_json(raw).map_err(invalid)?;

    let title = record
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_title.to_string());

    let summary = required_text(record.summary, "summary").map_err(invalid)?;
    let question = required_text(record.question, "question").map_err(invalid)?;
    let contributions =
        required_items(record.contributions, "contributions", CONTRIBUTIONS_RANGE).map_err(invalid)?;
    let limitations =
        required_items(record.limitations, "limitations", LIMITATIONS_RANGE).map_err(invalid)?;

    Ok(StructuredSummary {
        title,
        summary,
        contributions,
        limitations,
        question,
    })
}

fn extract_json(raw: &str) -> Result<RawSummary, String> {
    let trimmed = raw.trim();
    let unfenced = RE_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed);

    match serde_json::from_str::<RawSummary>(unfenced) {
        Ok(record) => Ok(record),
        Err(first) => {
            let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}')) else {
                return Err(format!("response is not JSON: {first}"));
            };
            if end <= start {
                return Err(format!("response is not JSON: {first}"));
            }
            serde_json::from_str::<RawSummary>(&unfenced[start..=end])
                .map_err(|e| format!("response is not a valid summary record: {e}"))
        }
    }
}

fn required_text(value: Option<String>, field: &str) -> Result<String, String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        Some(_) => Err(format!("field `{field}` is empty")),
        None => Err(format!("missing field `{field}`")),
    }
}

fn required_items(
    value: Option<Vec<SummaryItem>>,
    field: &str,
    (min, max): (usize, usize),
) -> Result<Vec<SummaryItem>, String> {
    let items: Vec<SummaryItem> = value
        .ok_or_else(|| format!("missing field `{field}`"))?
        .into_iter()
        .map(|item| SummaryItem {
            label: item.label.map(|l| l.trim().to_string()),
            text: item.text.trim().to_string(),
        })
        .collect();
    if items.iter().any(|i| i.text.is_empty()) {
        return Err(format!("field `{field}` contains an empty entry"));
    }
    if items.len() < min || items.len() > max {
        return Err(format!(
            "field `{field}` has {} entries, expected {min} to {max}",
            items.len()
        ));
    }
    Ok(items)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
