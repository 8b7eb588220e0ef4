/*!
 * Model-call clients for the supported chat endpoints.
 *
 * This module contains client implementations for various LLM providers:
 * - OpenAI-compatible: DeepSeek, OpenAI and LM Studio chat completions
 * - Anthropic: Anthropic messages API
 * - Mock: deterministic test double
 *
 * The translation core only sees the `ModelCaller` trait: an ordered list of
 * chat messages in, the model's text or a `ProviderError` out. Timeouts and
 * transport retries are each client's own business.
 */

use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;

pub mod anthropic;
pub mod mock;
pub mod openai;

pub use anthropic::Anthropic;
pub use mock::MockProvider;
pub use openai::OpenAiCompatible;

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Opaque model call: messages in, text or failure out
#[async_trait]
pub trait ModelCaller: Send + Sync {
    /// Send the conversation and return the model's reply text
    async fn call(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Transport retry policy shared by the HTTP clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff, doubled on each retry
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(1u64 << shift))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or retries run out
    pub async fn run<F, Fut, T>(&self, label: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    warn!(
                        "{} request failed: {} - retry {}/{} in {:?}",
                        label, e, attempt, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Map a reqwest transport failure onto the provider error taxonomy
pub(crate) fn transport_error(label: &str, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() || e.is_connect() {
        ProviderError::ConnectionError(format!("{}: {}", label, e))
    } else {
        ProviderError::RequestFailed(format!("{}: {}", label, e))
    }
}

/// Map a non-success HTTP status and vendor message onto the error taxonomy
pub(crate) fn status_error(status: u16, message: String) -> ProviderError {
    match status {
        401 | 403 => ProviderError::AuthenticationError(message),
        _ => ProviderError::ApiError {
            status_code: status,
            message,
        },
    }
}

/// Build the client for the configured provider
pub fn from_config(config: &TranslationConfig) -> Arc<dyn ModelCaller> {
    let retry = RetryPolicy {
        max_retries: config.common.retry_count,
        backoff_base_ms: config.common.retry_backoff_ms,
    };
    let timeout = Duration::from_secs(config.get_timeout_secs());

    match config.provider {
        TranslationProvider::Anthropic => Arc::new(
            Anthropic::new(config.get_api_key(), config.get_endpoint(), config.get_model(), timeout)
                .with_temperature(config.common.temperature)
                .with_retry(retry),
        ),
        provider => Arc::new(
            OpenAiCompatible::new(
                provider.display_name(),
                config.get_endpoint(),
                config.get_api_key(),
                config.get_model(),
                timeout,
            )
            .with_temperature(config.common.temperature)
            .with_retry(retry),
        ),
    }
}
