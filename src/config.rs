//! Configuration types for the paper-summarization pipeline.
//!
//! Every knob lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The builder clamps obviously out-of-range values
//! and `build()` rejects combinations that cannot work (an overlap as large as
//! the chunk would never advance the window).
//!
//! Credentials are plain values here; reading them from the environment is the
//! binary's job.

use crate::error::PaperError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default DeepL endpoint (paid plan). Free-plan keys use `api-free.deepl.com`.
pub const DEFAULT_DEEPL_URL: &str = "https://api.deepl.com/v2/translate";

/// Configuration for the summarization pipeline.
///
/// # Example
/// ```rust
/// use paperbrief::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .outbox("PapersOut")
///     .chunk_overlap(150)
///     .compile(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_threshold, 3000);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Directory watched for new PDFs. Default: `PapersInbox`.
    pub inbox: PathBuf,

    /// Directory receiving `.tex` (and compiled `.pdf`) artifacts. Default: `PapersOut`.
    pub outbox: PathBuf,

    /// Documents with at most this many words skip the condensation tier. Default: 3000.
    pub chunk_threshold: usize,

    /// Window size in words for each condensation chunk. Default: 3000.
    pub chunk_size: usize,

    /// Words shared between adjacent chunks. Must be below `chunk_size`. Default: 200.
    pub chunk_overlap: usize,

    /// What to do when a single chunk cannot be condensed. Default: fail the document.
    pub chunk_failure_policy: ChunkFailurePolicy,

    /// Concurrent condensation requests per document. Default: 1 (strictly sequential).
    ///
    /// Sequential dispatch stays well below provider rate limits for the
    /// 2–5 chunks a typical paper produces. Results are always joined in
    /// chunk order regardless of this value.
    pub condense_concurrency: usize,

    /// Documents processed at the same time in watch mode. Default: 1.
    pub concurrency: usize,

    /// Size samples taken before a new file counts as fully written. Default: 3.
    pub stability_samples: u32,

    /// Pause between two size samples. Default: 1 s.
    pub stability_interval: Duration,

    /// Suffixes of in-progress downloads that are never processed.
    pub ignore_suffixes: Vec<String>,

    /// Leading characters of hidden or backup files that are never processed.
    pub ignore_prefixes: Vec<char>,

    /// Try pdfium before lopdf when extracting text. Default: true.
    ///
    /// pdfium is downloaded on first use unless `PDFIUM_LIB_PATH` points at an
    /// existing copy. Disable it on air-gapped hosts to go straight to lopdf.
    pub use_pdfium: bool,

    /// Upper bound on text extraction for one file, in seconds. Default: 120.
    ///
    /// A hung extractor thread is left detached; the document fails and its
    /// watch slot is released.
    pub extract_timeout_secs: u64,

    /// LLM provider name (e.g. "anthropic", "openai", "gemini").
    /// If None along with `provider`, detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider used for both model roles. Takes precedence
    /// over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Fast model for per-chunk condensation and the rewrite fallback.
    /// If None, the provider's default fast model is used.
    pub chunk_model: Option<String>,

    /// Higher-quality model for the structuring pass.
    /// If None, the provider's default main model is used.
    pub main_model: Option<String>,

    /// Sampling temperature for every model call. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens per model response. Default: 2048.
    pub max_tokens: usize,

    /// Retries per model call on failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-model-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Run the rewrite stage at all. Default: true.
    pub rewrite: bool,

    /// DeepL API key. When None the primary rewriter is unavailable.
    pub deepl_api_key: Option<String>,

    /// DeepL endpoint. Default: [`DEFAULT_DEEPL_URL`].
    pub deepl_url: String,

    /// Language DeepL rewrites into. Default: "EN-US".
    pub deepl_target_lang: String,

    /// DeepL request timeout in seconds. Default: 30.
    pub deepl_timeout_secs: u64,

    /// Compile the `.tex` artifact with latexmk. Default: true.
    pub compile: bool,

    /// latexmk timeout in seconds. Default: 120.
    pub compile_timeout_secs: u64,

    /// Name printed under the title. Empty omits the author block.
    pub author: String,

    /// Optional footer note printed at the end of the document.
    pub note: Option<String>,

    /// Custom LaTeX template file. If None, the built-in template is used.
    pub template_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inbox: PathBuf::from("PapersInbox"),
            outbox: PathBuf::from("PapersOut"),
            chunk_threshold: 3000,
            chunk_size: 3000,
            chunk_overlap: 200,
            chunk_failure_policy: ChunkFailurePolicy::default(),
            condense_concurrency: 1,
            concurrency: 1,
            stability_samples: 3,
            stability_interval: Duration::from_secs(1),
            ignore_suffixes: vec![".crdownload".into(), ".part".into(), ".tmp".into()],
            ignore_prefixes: vec!['.', '~'],
            use_pdfium: true,
            extract_timeout_secs: 120,
            provider_name: None,
            provider: None,
            chunk_model: None,
            main_model: None,
            temperature: 0.2,
            max_tokens: 2048,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            rewrite: true,
            deepl_api_key: None,
            deepl_url: DEFAULT_DEEPL_URL.to_string(),
            deepl_target_lang: "EN-US".to_string(),
            deepl_timeout_secs: 30,
            compile: true,
            compile_timeout_secs: 120,
            author: String::new(),
            note: None,
            template_path: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("inbox", &self.inbox)
            .field("outbox", &self.outbox)
            .field("chunk_threshold", &self.chunk_threshold)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("chunk_failure_policy", &self.chunk_failure_policy)
            .field("condense_concurrency", &self.condense_concurrency)
            .field("concurrency", &self.concurrency)
            .field("stability_samples", &self.stability_samples)
            .field("stability_interval", &self.stability_interval)
            .field("extract_timeout_secs", &self.extract_timeout_secs)
            .field("provider_name", &self.provider_name)
            .field(
                "provider",
                &self.provider.as_ref().map(|_| "<dyn LLMProvider>"),
            )
            .field("chunk_model", &self.chunk_model)
            .field("main_model", &self.main_model)
            .field("rewrite", &self.rewrite)
            .field(
                "deepl_api_key",
                &self.deepl_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("compile", &self.compile)
            .field("template_path", &self.template_path)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when `name` looks like a partial download, hidden file, or backup.
    pub fn is_ignored_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.ignore_suffixes
            .iter()
            .any(|s| lower.ends_with(&s.to_lowercase()))
            || name
                .chars()
                .next()
                .is_some_and(|c| self.ignore_prefixes.contains(&c))
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn inbox(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.inbox = dir.into();
        self
    }

    pub fn outbox(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.outbox = dir.into();
        self
    }

    pub fn chunk_threshold(mut self, words: usize) -> Self {
        self.config.chunk_threshold = words;
        self
    }

    pub fn chunk_size(mut self, words: usize) -> Self {
        self.config.chunk_size = words.max(1);
        self
    }

    pub fn chunk_overlap(mut self, words: usize) -> Self {
        self.config.chunk_overlap = words;
        self
    }

    pub fn chunk_failure_policy(mut self, policy: ChunkFailurePolicy) -> Self {
        self.config.chunk_failure_policy = policy;
        self
    }

    pub fn condense_concurrency(mut self, n: usize) -> Self {
        self.config.condense_concurrency = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn stability_samples(mut self, n: u32) -> Self {
        self.config.stability_samples = n;
        self
    }

    pub fn stability_interval(mut self, interval: Duration) -> Self {
        self.config.stability_interval = interval;
        self
    }

    pub fn use_pdfium(mut self, enabled: bool) -> Self {
        self.config.use_pdfium = enabled;
        self
    }

    pub fn extract_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extract_timeout_secs = secs;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn chunk_model(mut self, model: impl Into<String>) -> Self {
        self.config.chunk_model = Some(model.into());
        self
    }

    pub fn main_model(mut self, model: impl Into<String>) -> Self {
        self.config.main_model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn rewrite(mut self, enabled: bool) -> Self {
        self.config.rewrite = enabled;
        self
    }

    /// Set the DeepL key. Empty strings count as "not configured".
    pub fn deepl_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.config.deepl_api_key = if key.trim().is_empty() {
            None
        } else {
            Some(key)
        };
        self
    }

    pub fn deepl_url(mut self, url: impl Into<String>) -> Self {
        self.config.deepl_url = url.into();
        self
    }

    pub fn deepl_target_lang(mut self, lang: impl Into<String>) -> Self {
        self.config.deepl_target_lang = lang.into();
        self
    }

    pub fn deepl_timeout_secs(mut self, secs: u64) -> Self {
        self.config.deepl_timeout_secs = secs.max(1);
        self
    }

    pub fn compile(mut self, enabled: bool) -> Self {
        self.config.compile = enabled;
        self
    }

    pub fn compile_timeout_secs(mut self, secs: u64) -> Self {
        self.config.compile_timeout_secs = secs.max(1);
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.config.author = author.into();
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.config.note = Some(note.into());
        self
    }

    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.template_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PaperError> {
        let c = &self.config;
        if c.chunk_overlap >= c.chunk_size {
            return Err(PaperError::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.stability_samples == 0 {
            return Err(PaperError::InvalidConfig(
                "stability samples must be ≥ 1".into(),
            ));
        }
        if c.extract_timeout_secs == 0 {
            return Err(PaperError::InvalidConfig(
                "extract timeout must be ≥ 1 second".into(),
            ));
        }
        if c.concurrency == 0 || c.condense_concurrency == 0 {
            return Err(PaperError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Policy applied when one chunk's condensation request fails.
///
/// | Policy | Effect |
/// |--------|--------|
/// | `FailFast` | The whole document fails; no artifact (default) |
/// | `Substitute` | The chunk contributes nothing; remaining chunks still structure |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkFailurePolicy {
    /// Abort the document on the first failed chunk. (default)
    #[default]
    FailFast,
    /// Drop the failed chunk and continue with the others.
    Substitute,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let c = PipelineConfig::default();
        assert_eq!(c.chunk_threshold, 3000);
        assert_eq!(c.chunk_size, 3000);
        assert_eq!(c.chunk_overlap, 200);
        assert_eq!(c.stability_samples, 3);
        assert_eq!(c.stability_interval, Duration::from_secs(1));
        assert_eq!(c.chunk_failure_policy, ChunkFailurePolicy::FailFast);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.condense_concurrency, 1);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let err = PipelineConfig::builder()
            .chunk_size(100)
            .chunk_overlap(100)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn zero_extract_timeout_rejected() {
        assert_eq!(PipelineConfig::default().extract_timeout_secs, 120);
        let err = PipelineConfig::builder()
            .extract_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, PaperError::InvalidConfig(_)));
    }

    #[test]
    fn zero_samples_rejected() {
        assert!(PipelineConfig::builder()
            .stability_samples(0)
            .build()
            .is_err());
    }

    #[test]
    fn empty_deepl_key_is_unconfigured() {
        let c = PipelineConfig::builder()
            .deepl_api_key("  ")
            .build()
            .unwrap();
        assert!(c.deepl_api_key.is_none());
        let c = PipelineConfig::builder()
            .deepl_api_key("abc:fx")
            .build()
            .unwrap();
        assert_eq!(c.deepl_api_key.as_deref(), Some("abc:fx"));
    }

    #[test]
    fn debug_redacts_key() {
        let c = PipelineConfig::builder()
            .deepl_api_key("secret-key")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn ignored_names() {
        let c = PipelineConfig::default();
        assert!(c.is_ignored_name("paper.pdf.crdownload"));
        assert!(c.is_ignored_name("paper.PART"));
        assert!(c.is_ignored_name("upload.tmp"));
        assert!(c.is_ignored_name(".hidden.pdf"));
        assert!(c.is_ignored_name("~paper.pdf"));
        assert!(!c.is_ignored_name("attention.pdf"));
    }

    #[test]
    fn policy_serialises_snake_case() {
        let json = serde_json::to_string(&ChunkFailurePolicy::FailFast).unwrap();
        assert_eq!(json, "\"fail_fast\"");
    }
}
