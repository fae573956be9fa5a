//! Single-document orchestration: one PDF in, one `.tex` (and maybe `.pdf`) out.
//!
//! [`Pipeline::process`] runs every stage in order for one file. Stages never
//! loop back and never retry an earlier stage. Only two outcomes leave this
//! module: `Ok(ProcessedDocument)` (artifact written, possibly unrewritten
//! or uncompiled) or `Err(PaperError)` (no artifact).
//!
//! A [`Pipeline`] holds no per-document state, so one instance can process
//! many documents concurrently.

use crate::config::PipelineConfig;
use crate::document::{document_name, Document};
use crate::error::{CompileError, PaperError};
use crate::output::{DocumentStats, ProcessedDocument};
use crate::pipeline::compile::{Compiler, LatexmkCompiler};
use crate::pipeline::extract::{sanitize_text, PdfTextExtractor, TextExtractor};
use crate::pipeline::llm::{LanguageModel, ProviderModel};
use crate::pipeline::render::{write_atomic, Template};
use crate::pipeline::rewrite::{DeepLRewriter, ModelRewriter, RewriteChain, Rewriter};
use crate::pipeline::summarize::Summarizer;
use crate::progress::{NoopProgressCallback, ProgressCallback, Stage};
use crate::shutdown::Shutdown;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Environment variable naming the provider when none is configured.
pub const PROVIDER_ENV: &str = "EDGEQUAKE_LLM_PROVIDER";

/// Provider detection order when neither config nor [`PROVIDER_ENV`] names one.
const PROVIDER_KEYS: &[(&str, &str)] = &[
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("openai", "OPENAI_API_KEY"),
    ("gemini", "GEMINI_API_KEY"),
];

/// Default `(fast, main)` model ids per provider.
pub fn default_models(provider: &str) -> Option<(&'static str, &'static str)> {
    match provider {
        "anthropic" => Some(("claude-haiku-4-5-20251001", "claude-opus-4-5")),
        "openai" => Some(("gpt-4.1-mini", "gpt-4.1")),
        "gemini" => Some(("gemini-2.0-flash", "gemini-2.5-pro")),
        _ => None,
    }
}

/// The fast and main models used by the pipeline.
pub struct Models {
    pub fast: Arc<dyn LanguageModel>,
    pub main: Arc<dyn LanguageModel>,
}

/// Resolve both model roles, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used for both roles.
/// 2. **Named provider** (`config.provider_name`).
/// 3. **`EDGEQUAKE_LLM_PROVIDER`** from the environment.
/// 4. **First API key found**: Anthropic, OpenAI, Gemini.
///
/// Model ids come from `config.chunk_model` / `config.main_model`, else the
/// provider's defaults from [`default_models`].
pub fn resolve_models(config: &PipelineConfig) -> Result<Models, PaperError> {
    if let Some(ref provider) = config.provider {
        let fast = config.chunk_model.as_deref().unwrap_or("fast");
        let main = config.main_model.as_deref().unwrap_or("main");
        return Ok(Models {
            fast: Arc::new(ProviderModel::new(Arc::clone(provider), fast, config)),
            main: Arc::new(ProviderModel::new(Arc::clone(provider), main, config)),
        });
    }

    let name = match config.provider_name.clone().or_else(provider_from_env) {
        Some(name) => name.to_lowercase(),
        None => {
            return Err(PaperError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: "No LLM provider could be auto-detected from environment.\n\
                       Set ANTHROPIC_API_KEY, OPENAI_API_KEY, or GEMINI_API_KEY, \
                       or name a provider with --provider."
                    .to_string(),
            })
        }
    };

    let defaults = default_models(&name);
    let pick = |configured: &Option<String>, default: Option<&'static str>, role: &str| {
        configured
            .clone()
            .or_else(|| default.map(str::to_string))
            .ok_or_else(|| PaperError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("No default {role} model is known for '{name}'; set one explicitly."),
            })
    };
    let fast_model = pick(&config.chunk_model, defaults.map(|d| d.0), "chunk")?;
    let main_model = pick(&config.main_model, defaults.map(|d| d.1), "main")?;

    info!(provider = %name, fast = %fast_model, main = %main_model, "resolved language models");
    Ok(Models {
        fast: Arc::new(ProviderModel::new(
            create_provider(&name, &fast_model)?,
            fast_model,
            config,
        )),
        main: Arc::new(ProviderModel::new(
            create_provider(&name, &main_model)?,
            main_model,
            config,
        )),
    })
}

fn provider_from_env() -> Option<String> {
    if let Ok(name) = std::env::var(PROVIDER_ENV) {
        if !name.trim().is_empty() {
            return Some(name.trim().to_string());
        }
    }
    PROVIDER_KEYS
        .iter()
        .find(|(_, key)| std::env::var(key).is_ok_and(|v| !v.trim().is_empty()))
        .map(|(name, _)| name.to_string())
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PaperError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        PaperError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// Everything needed to process documents, wired once.
pub struct Pipeline {
    config: PipelineConfig,
    extractor: Arc<dyn TextExtractor>,
    summarizer: Summarizer,
    rewrite: RewriteChain,
    compiler: Option<Arc<dyn Compiler>>,
    template: Template,
    progress: ProgressCallback,
    shutdown: Shutdown,
}

impl Pipeline {
    /// Wire the default collaborators for `config`.
    pub fn from_config(config: PipelineConfig) -> Result<Self, PaperError> {
        Self::builder(config).build()
    }

    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder {
            config,
            extractor: None,
            models: None,
            primary: None,
            fallback: None,
            compiler: None,
            progress: None,
            shutdown: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Process one PDF end to end.
    ///
    /// # Errors
    /// Any fatal stage failure; see [`PaperError`]. Rewrite and compile
    /// failures are logged and never surface here.
    pub async fn process(&self, path: &Path) -> Result<ProcessedDocument, PaperError> {
        let name = document_name(path);
        self.progress.on_document_start(&name);
        info!(document = %name, path = %path.display(), "processing document");

        let result = self.run(path, &name).await;
        match &result {
            Ok(done) => {
                self.progress.on_document_complete(&name, &done.tex_path);
            }
            Err(e) => {
                error!(document = %name, "document failed: {}", e);
                self.progress.on_document_failed(&name, &e.to_string());
            }
        }
        result
    }

    async fn run(&self, path: &Path, name: &str) -> Result<ProcessedDocument, PaperError> {
        let total_start = Instant::now();

        // ── Step 1: Extract ──────────────────────────────────────────────
        self.checkpoint("extraction")?;
        self.progress.on_stage(name, Stage::Extracting);
        let extract_start = Instant::now();
        let byte_len = file_len(path).await?;
        let extractor = Arc::clone(&self.extractor);
        let owned = path.to_path_buf();
        let limit = Duration::from_secs(self.config.extract_timeout_secs);
        let task = tokio::task::spawn_blocking(move || extractor.extract(&owned));
        let raw = match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined
                .map_err(|e| PaperError::Internal(format!("extraction task panicked: {e}")))??,
            Err(_) => {
                return Err(PaperError::ExtractionFailed {
                    path: path.to_path_buf(),
                    detail: format!("timed out after {}s", limit.as_secs()),
                })
            }
        };

        let doc = Document::new(path, byte_len, sanitize_text(&raw));
        if doc.word_count == 0 {
            return Err(PaperError::EmptyText {
                path: path.to_path_buf(),
            });
        }
        let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
        info!(
            document = %doc.name,
            words = doc.word_count,
            bytes = doc.byte_len,
            elapsed_ms = extract_duration_ms,
            "text extracted"
        );

        // ── Step 2: Summarize ────────────────────────────────────────────
        self.checkpoint("summarization")?;
        let summarize_start = Instant::now();
        let outcome = self.summarizer.summarize(&doc.name, &doc.text).await?;
        let summarize_duration_ms = summarize_start.elapsed().as_millis() as u64;
        info!(
            document = %doc.name,
            chunks = outcome.chunk_count,
            elapsed_ms = summarize_duration_ms,
            "summarization complete"
        );

        // ── Step 3: Rewrite ──────────────────────────────────────────────
        self.checkpoint("rewrite")?;
        self.progress.on_stage(name, Stage::Rewriting);
        let rewrite_start = Instant::now();
        let rewritten = self.rewrite.rewrite(&doc.name, &outcome.summary).await;
        let rewrite_duration_ms = rewrite_start.elapsed().as_millis() as u64;

        // ── Step 4: Render + atomic write ────────────────────────────────
        self.checkpoint("rendering")?;
        self.progress.on_stage(name, Stage::Rendering);
        let tex = self.template.render(
            &rewritten.summary,
            &self.config.author,
            self.config.note.as_deref(),
        );
        let tex_path = write_atomic(&self.config.outbox, &format!("{}.tex", doc.name), tex).await?;
        info!(document = %doc.name, path = %tex_path.display(), "LaTeX written");

        // ── Step 5: Compile (best-effort) ────────────────────────────────
        let pdf_path = match &self.compiler {
            Some(_) if self.shutdown.is_triggered() => {
                debug!(document = %doc.name, "shutdown requested, skipping compile");
                None
            }
            Some(compiler) => {
                self.progress.on_stage(name, Stage::Compiling);
                match compiler.compile(&tex_path).await {
                    Ok(pdf) => {
                        info!(document = %doc.name, path = %pdf.display(), "PDF compiled");
                        Some(pdf)
                    }
                    Err(CompileError::NotInstalled { program }) => {
                        info!(document = %doc.name, "{} not installed, skipping PDF compilation", program);
                        None
                    }
                    Err(e) => {
                        warn!(document = %doc.name, "compilation failed, keeping .tex: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        Ok(ProcessedDocument {
            source: path.to_path_buf(),
            tex_path,
            pdf_path,
            summary: rewritten.summary,
            provenance: rewritten.provenance,
            stats: DocumentStats {
                byte_len: doc.byte_len,
                word_count: doc.word_count,
                chunk_count: outcome.chunk_count,
                condensation_calls: outcome.condensation_calls,
                extract_duration_ms,
                summarize_duration_ms,
                rewrite_duration_ms,
                total_duration_ms: total_start.elapsed().as_millis() as u64,
            },
        })
    }

    fn checkpoint(&self, stage: &'static str) -> Result<(), PaperError> {
        if self.shutdown.is_triggered() {
            return Err(PaperError::Cancelled { stage });
        }
        Ok(())
    }
}

async fn file_len(path: &Path) -> Result<u64, PaperError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(PaperError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(PaperError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

/// Builder for [`Pipeline`]. Unset collaborators get their defaults.
pub struct PipelineBuilder {
    config: PipelineConfig,
    extractor: Option<Arc<dyn TextExtractor>>,
    models: Option<Models>,
    primary: Option<Arc<dyn Rewriter>>,
    fallback: Option<Arc<dyn Rewriter>>,
    compiler: Option<Arc<dyn Compiler>>,
    progress: Option<ProgressCallback>,
    shutdown: Option<Shutdown>,
}

impl PipelineBuilder {
    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Use these models instead of resolving a provider.
    pub fn models(mut self, fast: Arc<dyn LanguageModel>, main: Arc<dyn LanguageModel>) -> Self {
        self.models = Some(Models { fast, main });
        self
    }

    /// Replace the DeepL primary rewriter.
    pub fn primary_rewriter(mut self, rewriter: Arc<dyn Rewriter>) -> Self {
        self.primary = Some(rewriter);
        self
    }

    /// Replace the fast-model fallback rewriter.
    pub fn fallback_rewriter(mut self, rewriter: Arc<dyn Rewriter>) -> Self {
        self.fallback = Some(rewriter);
        self
    }

    /// Replace latexmk. Ignored when compilation is disabled.
    pub fn compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn build(self) -> Result<Pipeline, PaperError> {
        let config = self.config;
        let models = match self.models {
            Some(m) => m,
            None => resolve_models(&config)?,
        };
        let progress = self
            .progress
            .unwrap_or_else(|| Arc::new(NoopProgressCallback));

        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(PdfTextExtractor::new(config.use_pdfium)));

        let summarizer =
            Summarizer::from_config(Arc::clone(&models.fast), Arc::clone(&models.main), &config)?
                .with_progress(Arc::clone(&progress));

        let rewrite = if config.rewrite {
            let primary = self.primary.or_else(|| {
                let deepl = DeepLRewriter::from_config(&config);
                if deepl.is_configured() {
                    Some(Arc::new(deepl) as Arc<dyn Rewriter>)
                } else {
                    info!("DEEPL_API_KEY not set, rewriting with the fast model");
                    None
                }
            });
            let fallback = self
                .fallback
                .unwrap_or_else(|| Arc::new(ModelRewriter::new(Arc::clone(&models.fast))));
            RewriteChain::new(primary, Some(fallback))
        } else {
            RewriteChain::disabled()
        };

        let compiler = if config.compile {
            Some(
                self.compiler
                    .unwrap_or_else(|| Arc::new(LatexmkCompiler::new(config.compile_timeout_secs))),
            )
        } else {
            None
        };

        let template = match config.template_path {
            Some(ref path) => Template::load(path)?,
            None => Template::builtin(),
        };

        Ok(Pipeline {
            config,
            extractor,
            summarizer,
            rewrite,
            compiler,
            template,
            progress,
            shutdown: self.shutdown.unwrap_or_default(),
        })
    }
}
