//! CLI binary for paperbrief.
//!
//! A thin shim over the library crate: maps flags and environment variables
//! to `PipelineConfig`, then either watches the inbox or processes one file.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paperbrief::{
    watch, ChunkFailurePolicy, Pipeline, PipelineConfig, PipelineProgressCallback,
    ProgressCallback, Stage,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────

/// Spinner for `--dry-run`: one line per finished chunk, stage in the message.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("paperbrief");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_document_start(&self, doc: &str) {
        self.bar.set_prefix(doc.to_string());
    }

    fn on_stage(&self, _doc: &str, stage: Stage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_chunk_start(&self, _doc: &str, chunk: usize, total: usize) {
        self.bar
            .set_message(format!("condensing chunk {chunk}/{total}…"));
    }

    fn on_chunk_complete(&self, _doc: &str, chunk: usize, total: usize) {
        self.bar
            .println(format!("  {} chunk {chunk}/{total}", green("✓")));
    }

    fn on_chunk_error(&self, _doc: &str, chunk: usize, total: usize, error: &str) {
        self.bar.println(format!(
            "  {} chunk {chunk}/{total}  {}",
            red("✗"),
            red(error)
        ));
    }

    fn on_document_complete(&self, _doc: &str, tex_path: &Path) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", green("✔"), bold(&tex_path.display().to_string()));
    }

    fn on_document_failed(&self, doc: &str, error: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {doc}: {}", red("✘"), error);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Watch ~/PapersInbox and write summaries to ~/PapersOut
  paperbrief --inbox ~/PapersInbox --outbox ~/PapersOut

  # Process a single file and exit
  paperbrief --dry-run attention.pdf

  # Machine-readable result
  paperbrief --dry-run attention.pdf --json --no-compile

  # Keep going when one chunk of a long paper fails
  paperbrief --on-chunk-failure substitute

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY       Anthropic API key (default provider when set)
  OPENAI_API_KEY          OpenAI API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (anthropic, openai, gemini, ...)
  DEEPL_API_KEY           DeepL key for the rewrite step (optional)
  PDFIUM_LIB_PATH         Path to an existing libpdfium, skips auto-download
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Summarize academic PDFs into one-page LaTeX documents.
#[derive(Parser, Debug)]
#[command(
    name = "paperbrief",
    version,
    about = "Summarize academic PDFs into one-page LaTeX documents",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Process this single PDF and exit instead of watching the inbox.
    #[arg(long, value_name = "PDF")]
    dry_run: Option<PathBuf>,

    /// Directory watched for new PDFs.
    #[arg(long, env = "PAPERS_INBOX", default_value = "PapersInbox")]
    inbox: PathBuf,

    /// Directory receiving .tex and .pdf summaries.
    #[arg(long, env = "PAPERS_OUTBOX", default_value = "PapersOut")]
    outbox: PathBuf,

    /// LLM provider: anthropic, openai, gemini. Auto-detected if unset.
    #[arg(long, env = "PAPERBRIEF_PROVIDER")]
    provider: Option<String>,

    /// Fast model for chunk condensation and the rewrite fallback.
    #[arg(long, env = "PAPERBRIEF_CHUNK_MODEL")]
    chunk_model: Option<String>,

    /// Model for the structuring pass.
    #[arg(long, env = "PAPERBRIEF_MAIN_MODEL")]
    main_model: Option<String>,

    /// DeepL API key for the rewrite step.
    #[arg(long, env = "DEEPL_API_KEY", hide_env_values = true)]
    deepl_api_key: Option<String>,

    /// DeepL endpoint (use https://api-free.deepl.com/v2/translate for free keys).
    #[arg(long, env = "DEEPL_API_URL")]
    deepl_url: Option<String>,

    /// Skip the rewrite step.
    #[arg(long, env = "PAPERBRIEF_NO_REWRITE")]
    no_rewrite: bool,

    /// Do not run latexmk.
    #[arg(long, env = "PAPERBRIEF_NO_COMPILE")]
    no_compile: bool,

    /// Extract text with lopdf only (no pdfium download).
    #[arg(long, env = "PAPERBRIEF_NO_PDFIUM")]
    no_pdfium: bool,

    /// Word count above which a paper is condensed chunk by chunk.
    #[arg(long, env = "PAPERBRIEF_CHUNK_THRESHOLD", default_value_t = 3000)]
    chunk_threshold: usize,

    /// Words per chunk.
    #[arg(long, env = "PAPERBRIEF_CHUNK_SIZE", default_value_t = 3000)]
    chunk_size: usize,

    /// Words shared by adjacent chunks.
    #[arg(long, env = "PAPERBRIEF_CHUNK_OVERLAP", default_value_t = 200)]
    chunk_overlap: usize,

    /// What to do when one chunk cannot be condensed.
    #[arg(
        long,
        env = "PAPERBRIEF_ON_CHUNK_FAILURE",
        value_enum,
        default_value = "fail"
    )]
    on_chunk_failure: ChunkFailureArg,

    /// Documents processed at the same time in watch mode.
    #[arg(long, env = "PAPERBRIEF_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Concurrent condensation requests per document.
    #[arg(long, env = "PAPERBRIEF_CONDENSE_CONCURRENCY", default_value_t = 1)]
    condense_concurrency: usize,

    /// Size samples before a new file counts as complete.
    #[arg(long, env = "PAPERBRIEF_STABILITY_SAMPLES", default_value_t = 3)]
    stability_samples: u32,

    /// Milliseconds between size samples.
    #[arg(long, env = "PAPERBRIEF_STABILITY_INTERVAL_MS", default_value_t = 1000)]
    stability_interval_ms: u64,

    /// Upper bound on text extraction per file, in seconds.
    #[arg(long, env = "PAPERBRIEF_EXTRACT_TIMEOUT", default_value_t = 120)]
    extract_timeout: u64,

    /// Per-request model timeout in seconds.
    #[arg(long, env = "PAPERBRIEF_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Retries per model request.
    #[arg(long, env = "PAPERBRIEF_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Author line printed under the title.
    #[arg(long, env = "PAPERBRIEF_AUTHOR")]
    author: Option<String>,

    /// Footer note printed at the end of each summary.
    #[arg(long, env = "PAPERBRIEF_NOTE")]
    note: Option<String>,

    /// Custom LaTeX template using %%SLOT%% placeholders.
    #[arg(long, env = "PAPERBRIEF_TEMPLATE")]
    template: Option<PathBuf>,

    /// Print the processed-document record as JSON (with --dry-run).
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAPERBRIEF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAPERBRIEF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ChunkFailureArg {
    Fail,
    Substitute,
}

impl From<ChunkFailureArg> for ChunkFailurePolicy {
    fn from(v: ChunkFailureArg) -> Self {
        match v {
            ChunkFailureArg::Fail => ChunkFailurePolicy::FailFast,
            ChunkFailureArg::Substitute => ChunkFailurePolicy::Substitute,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The dry-run spinner gives enough feedback; keep library logs at warn
    // underneath it unless asked for more.
    let show_progress = cli.dry_run.is_some() && !cli.quiet && !cli.json && !cli.verbose;
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    // ── Dry-run: one file, exit code reflects the outcome ────────────────
    if let Some(ref pdf) = cli.dry_run {
        if !pdf.exists() {
            bail!("File not found: {}", pdf.display());
        }
        if !pdf
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        {
            bail!("Not a PDF file: {}", pdf.display());
        }

        let mut builder = Pipeline::builder(config);
        if show_progress {
            builder = builder.progress(CliProgressCallback::new() as ProgressCallback);
        }
        let pipeline = builder.build().context("Failed to set up pipeline")?;

        let done = pipeline
            .process(pdf)
            .await
            .with_context(|| format!("Failed to process {}", pdf.display()))?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&done).context("Failed to serialise output")?
            );
        } else if !cli.quiet {
            eprintln!(
                "   {} words, {} chunk(s), rewrite: {}, {}ms",
                dim(&done.stats.word_count.to_string()),
                done.stats.chunk_count,
                done.provenance,
                done.stats.total_duration_ms
            );
            if let Some(ref pdf_out) = done.pdf_path {
                eprintln!("   {}", bold(&pdf_out.display().to_string()));
            }
        }
        return Ok(());
    }

    // ── Watch mode ───────────────────────────────────────────────────────
    let pipeline = Arc::new(Pipeline::from_config(config).context("Failed to set up pipeline")?);
    watch(pipeline).await.context("Watcher failed")?;
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .inbox(&cli.inbox)
        .outbox(&cli.outbox)
        .chunk_threshold(cli.chunk_threshold)
        .chunk_size(cli.chunk_size)
        .chunk_overlap(cli.chunk_overlap)
        .chunk_failure_policy(cli.on_chunk_failure.clone().into())
        .concurrency(cli.concurrency)
        .condense_concurrency(cli.condense_concurrency)
        .stability_samples(cli.stability_samples)
        .stability_interval(Duration::from_millis(cli.stability_interval_ms))
        .extract_timeout_secs(cli.extract_timeout)
        .api_timeout_secs(cli.api_timeout)
        .max_retries(cli.max_retries)
        .use_pdfium(!cli.no_pdfium)
        .rewrite(!cli.no_rewrite)
        .compile(!cli.no_compile);

    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p);
    }
    if let Some(ref m) = cli.chunk_model {
        builder = builder.chunk_model(m);
    }
    if let Some(ref m) = cli.main_model {
        builder = builder.main_model(m);
    }
    if let Some(ref k) = cli.deepl_api_key {
        builder = builder.deepl_api_key(k);
    }
    if let Some(ref u) = cli.deepl_url {
        builder = builder.deepl_url(u);
    }
    if let Some(ref a) = cli.author {
        builder = builder.author(a);
    }
    if let Some(ref n) = cli.note {
        builder = builder.note(n);
    }
    if let Some(ref t) = cli.template {
        builder = builder.template_path(t);
    }

    builder.build().context("Invalid configuration")
}
