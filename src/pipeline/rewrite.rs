//! Academic-tone rewrite with a primary/fallback provider chain.
//!
//! ```text
//! TryPrimary ──ok──▶ Done(primary)
//!     │ unavailable / failed / timed out
//!     ▼
//! TryFallback ──ok──▶ Done(fallback)
//!     │ failed
//!     ▼
//! Done(unrewritten)   text from the structuring tier, unchanged
//! ```
//!
//! Rewriting never fails a document. Titles and item labels are not
//! rewritten; see [`StructuredSummary::rewritable_texts`].

use crate::config::PipelineConfig;
use crate::error::RewriteError;
use crate::output::{Provenance, RewriteResult, StructuredSummary};
use crate::pipeline::llm::LanguageModel;
use crate::prompts;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A rewrite provider. Returns exactly one output per input text, in order.
#[async_trait]
pub trait Rewriter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn rewrite(&self, texts: &[String]) -> Result<Vec<String>, RewriteError>;
}

// ── DeepL ────────────────────────────────────────────────────────────────

/// Primary provider: the DeepL translate endpoint, asked to "translate"
/// English into English, which polishes wording without changing meaning.
pub struct DeepLRewriter {
    client: reqwest::Client,
    api_key: Option<String>,
    url: String,
    target_lang: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct DeepLRequest<'a> {
    text: &'a [String],
    source_lang: &'a str,
    target_lang: &'a str,
}

#[derive(Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Deserialize)]
struct DeepLTranslation {
    text: String,
}

impl DeepLRewriter {
    pub fn new(
        api_key: Option<String>,
        url: impl Into<String>,
        target_lang: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            url: url.into(),
            target_lang: target_lang.into(),
            timeout_secs,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.deepl_api_key.clone(),
            config.deepl_url.clone(),
            config.deepl_target_lang.clone(),
            config.deepl_timeout_secs,
        )
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl Rewriter for DeepLRewriter {
    fn name(&self) -> &'static str {
        "deepl"
    }

    async fn rewrite(&self, texts: &[String]) -> Result<Vec<String>, RewriteError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(RewriteError::Unavailable {
                provider: self.name(),
                reason: "no API key configured".into(),
            });
        };

        let body = DeepLRequest {
            text: texts,
            source_lang: "EN",
            target_lang: &self.target_lang,
        };
        let http_err = |detail: String| RewriteError::Http {
            provider: "deepl",
            detail,
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("DeepL-Auth-Key {key}"))
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    http_err(format!("timed out after {}s", self.timeout_secs))
                } else {
                    http_err(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(http_err(format!("HTTP {}", response.status())));
        }

        let parsed: DeepLResponse = response
            .json()
            .await
            .map_err(|e| http_err(format!("unexpected response body: {e}")))?;
        collect_translations(parsed, texts.len())
    }
}

fn collect_translations(
    response: DeepLResponse,
    expected: usize,
) -> Result<Vec<String>, RewriteError> {
    let out: Vec<String> = response
        .translations
        .into_iter()
        .map(|t| t.text.trim().to_string())
        .collect();
    if out.len() != expected || out.iter().any(|t| t.is_empty()) {
        return Err(RewriteError::Mismatch {
            provider: "deepl",
            expected,
            got: out.iter().filter(|t| !t.is_empty()).count(),
        });
    }
    Ok(out)
}

// ── Language-model fallback ──────────────────────────────────────────────

/// Fallback provider: one fast-model call per field.
pub struct ModelRewriter {
    model: Arc<dyn LanguageModel>,
}

impl ModelRewriter {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Rewriter for ModelRewriter {
    fn name(&self) -> &'static str {
        "model"
    }

    async fn rewrite(&self, texts: &[String]) -> Result<Vec<String>, RewriteError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let rewritten = self
                .model
                .complete(
                    prompts::REWRITE_SYSTEM_PROMPT,
                    &prompts::rewrite_prompt(text),
                )
                .await?;
            out.push(rewritten);
        }
        Ok(out)
    }
}

// ── Chain ────────────────────────────────────────────────────────────────

enum RewriteState {
    TryPrimary,
    TryFallback,
    Done(Provenance, Option<&'static str>, Option<StructuredSummary>),
}

/// Primary then fallback. Either slot may be empty.
#[derive(Default)]
pub struct RewriteChain {
    primary: Option<Arc<dyn Rewriter>>,
    fallback: Option<Arc<dyn Rewriter>>,
}

impl RewriteChain {
    pub fn new(primary: Option<Arc<dyn Rewriter>>, fallback: Option<Arc<dyn Rewriter>>) -> Self {
        Self { primary, fallback }
    }

    /// A chain that never rewrites.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Rewrite the summary's prose fields. Never fails: when both providers
    /// fail the input comes back unchanged with [`Provenance::Unrewritten`].
    pub async fn rewrite(&self, doc: &str, summary: &StructuredSummary) -> RewriteResult {
        let texts = summary.rewritable_texts();
        let mut state = RewriteState::TryPrimary;

        loop {
            state = match state {
                RewriteState::TryPrimary => match self.primary.as_deref() {
                    Some(p) => match attempt(p, summary, &texts).await {
                        Ok(s) => RewriteState::Done(Provenance::Primary, Some(p.name()), Some(s)),
                        Err(e) => {
                            warn!(
                                document = doc,
                                provider = p.name(),
                                "primary rewrite failed: {}",
                                e
                            );
                            RewriteState::TryFallback
                        }
                    },
                    None => RewriteState::TryFallback,
                },
                RewriteState::TryFallback => match self.fallback.as_deref() {
                    Some(f) => match attempt(f, summary, &texts).await {
                        Ok(s) => RewriteState::Done(Provenance::Fallback, Some(f.name()), Some(s)),
                        Err(e) => {
                            warn!(
                                document = doc,
                                provider = f.name(),
                                "fallback rewrite failed: {}",
                                e
                            );
                            RewriteState::Done(Provenance::Unrewritten, None, None)
                        }
                    },
                    None => RewriteState::Done(Provenance::Unrewritten, None, None),
                },
                RewriteState::Done(provenance, provider, rewritten) => {
                    info!(
                        document = doc,
                        provenance = %provenance,
                        provider = provider.unwrap_or("none"),
                        "rewrite finished"
                    );
                    return RewriteResult {
                        summary: rewritten.unwrap_or_else(|| summary.clone()),
                        provenance,
                        provider: provider.map(str::to_string),
                    };
                }
            };
        }
    }
}

async fn attempt(
    provider: &dyn Rewriter,
    summary: &StructuredSummary,
    texts: &[String],
) -> Result<StructuredSummary, RewriteError> {
    let out = provider.rewrite(texts).await?;
    let got = out.len();
    if out.iter().any(|t| t.trim().is_empty()) {
        return Err(RewriteError::Mismatch {
            provider: provider.name(),
            expected: texts.len(),
            got: out.iter().filter(|t| !t.trim().is_empty()).count(),
        });
    }
    debug!(provider = provider.name(), fields = got, "rewrite returned");
    summary
        .with_rewritten_texts(out)
        .ok_or(RewriteError::Mismatch {
            provider: provider.name(),
            expected: texts.len(),
            got,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::output::SummaryItem;

    fn summary() -> StructuredSummary {
        StructuredSummary {
            title: "T".into(),
            summary: "we did thing".into(),
            contributions: vec![SummaryItem::labelled("A", "c1"), SummaryItem::new("c2")],
            limitations: vec![SummaryItem::new("l1")],
            question: "why?".into(),
        }
    }

    struct Upper;

    #[async_trait]
    impl Rewriter for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }
        async fn rewrite(&self, texts: &[String]) -> Result<Vec<String>, RewriteError> {
            Ok(texts.iter().map(|t| t.to_uppercase()).collect())
        }
    }

    struct Broken;

    #[async_trait]
    impl Rewriter for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        async fn rewrite(&self, _texts: &[String]) -> Result<Vec<String>, RewriteError> {
            Err(RewriteError::Http {
                provider: "broken",
                detail: "connection refused".into(),
            })
        }
    }

    struct Short;

    #[async_trait]
    impl Rewriter for Short {
        fn name(&self) -> &'static str {
            "short"
        }
        async fn rewrite(&self, _texts: &[String]) -> Result<Vec<String>, RewriteError> {
            Ok(vec!["only one".into()])
        }
    }

    struct Echo;

    #[async_trait]
    impl LanguageModel for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String, ModelError> {
            Ok(prompt.rsplit("\n\n").next().unwrap_or_default().to_string() + ".")
        }
    }

    #[tokio::test]
    async fn primary_success_is_primary() {
        let chain = RewriteChain::new(Some(Arc::new(Upper)), Some(Arc::new(Broken)));
        let out = chain.rewrite("d", &summary()).await;
        assert_eq!(out.provenance, Provenance::Primary);
        assert_eq!(out.provider.as_deref(), Some("upper"));
        assert_eq!(out.summary.summary, "WE DID THING");
        assert_eq!(out.summary.title, "T");
        assert_eq!(out.summary.contributions[0].label.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn primary_failure_falls_back() {
        let chain = RewriteChain::new(Some(Arc::new(Broken)), Some(Arc::new(Upper)));
        let out = chain.rewrite("d", &summary()).await;
        assert_eq!(out.provenance, Provenance::Fallback);
        assert_eq!(out.summary.question, "WHY?");
    }

    #[tokio::test]
    async fn missing_primary_falls_back() {
        let chain = RewriteChain::new(None, Some(Arc::new(Upper)));
        assert_eq!(
            chain.rewrite("d", &summary()).await.provenance,
            Provenance::Fallback
        );
    }

    #[tokio::test]
    async fn count_mismatch_counts_as_failure() {
        let chain = RewriteChain::new(Some(Arc::new(Short)), Some(Arc::new(Upper)));
        assert_eq!(
            chain.rewrite("d", &summary()).await.provenance,
            Provenance::Fallback
        );
    }

    #[tokio::test]
    async fn both_failing_leaves_text_unchanged() {
        let chain = RewriteChain::new(Some(Arc::new(Broken)), Some(Arc::new(Broken)));
        let out = chain.rewrite("d", &summary()).await;
        assert_eq!(out.provenance, Provenance::Unrewritten);
        assert_eq!(out.provider, None);
        assert_eq!(out.summary, summary());
    }

    #[tokio::test]
    async fn disabled_chain_is_unrewritten() {
        let out = RewriteChain::disabled().rewrite("d", &summary()).await;
        assert_eq!(out.provenance, Provenance::Unrewritten);
        assert_eq!(out.summary, summary());
    }

    #[tokio::test]
    async fn deepl_without_key_is_unavailable() {
        let deepl = DeepLRewriter::new(Some("  ".into()), "http://127.0.0.1:1", "EN-US", 1);
        assert!(!deepl.is_configured());
        let err = deepl.rewrite(&["x".into()]).await.unwrap_err();
        assert!(matches!(
            err,
            RewriteError::Unavailable {
                provider: "deepl",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn deepl_connection_error_is_http_error() {
        let deepl = DeepLRewriter::new(
            Some("k".into()),
            "http://127.0.0.1:1/v2/translate",
            "EN-US",
            2,
        );
        let err = deepl.rewrite(&["x".into()]).await.unwrap_err();
        assert!(matches!(
            err,
            RewriteError::Http {
                provider: "deepl",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn model_rewriter_rewrites_each_field() {
        let out = ModelRewriter::new(Arc::new(Echo))
            .rewrite(&["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(out, vec!["a.", "b."]);
    }

    #[test]
    fn deepl_response_parsing() {
        let ok: DeepLResponse = serde_json::from_str(
            r#"{"translations":[{"detected_source_language":"EN","text":" A "},{"text":"B"}]}"#,
        )
        .unwrap();
        assert_eq!(collect_translations(ok, 2).unwrap(), vec!["A", "B"]);

        let short: DeepLResponse =
            serde_json::from_str(r#"{"translations":[{"text":"A"}]}"#).unwrap();
        assert!(matches!(
            collect_translations(short, 2),
            Err(RewriteError::Mismatch {
                expected: 2,
                got: 1,
                ..
            })
        ));
    }

    #[test]
    fn request_body_shape() {
        let texts = vec!["one".to_string()];
        let body = serde_json::to_value(DeepLRequest {
            text: &texts,
            source_lang: "EN",
            target_lang: "EN-US",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"text": ["one"], "source_lang": "EN", "target_lang": "EN-US"})
        );
    }
}
