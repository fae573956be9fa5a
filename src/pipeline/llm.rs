//! Language-model calls: a small trait at the seam, one implementation over
//! `edgequake-llm`.
//!
//! The orchestrators only ever need "prompt in, text out", so they depend on
//! [`LanguageModel`] rather than on a provider type. That keeps them testable
//! with scripted models and lets the fast and main roles use different
//! providers.
//!
//! ## Retry Strategy
//!
//! Every call is bounded by `api_timeout_secs`; a timeout counts as a failed
//! attempt. Failed attempts are retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`): with 500 ms base and 3 retries the wait
//! sequence is 500 ms → 1 s → 2 s.

use crate::config::PipelineConfig;
use crate::error::ModelError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// A text-completion collaborator.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Send one system + user turn and return the trimmed response text.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ModelError>;
}

/// [`LanguageModel`] backed by an `edgequake-llm` provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    model: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    timeout_secs: u64,
}

impl ProviderModel {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        model: impl Into<String>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }
}

#[async_trait]
impl LanguageModel for ProviderModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ModelError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];
        let mut last_err: Option<ModelError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    self.model, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let call = self.provider.chat(&messages, Some(&self.options));
            match timeout(Duration::from_secs(self.timeout_secs), call).await {
                Ok(Ok(response)) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        self.model,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    let content = response.content.trim().to_string();
                    if content.is_empty() {
                        last_err = Some(ModelError::EmptyResponse {
                            model: self.model.clone(),
                        });
                        continue;
                    }
                    return Ok(content);
                }
                Ok(Err(e)) => {
                    warn!("{}: attempt {} failed: {}", self.model, attempt + 1, e);
                    last_err = Some(ModelError::Provider {
                        model: self.model.clone(),
                        attempts: attempt + 1,
                        detail: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(
                        "{}: attempt {} timed out after {}s",
                        self.model,
                        attempt + 1,
                        self.timeout_secs
                    );
                    last_err = Some(ModelError::Timeout {
                        model: self.model.clone(),
                        secs: self.timeout_secs,
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ModelError::Provider {
            model: self.model.clone(),
            attempts: self.max_retries + 1,
            detail: "unknown error".into(),
        }))
    }
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = PipelineConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(2048));
    }
}
