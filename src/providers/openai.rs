use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChatMessage, ModelCaller, RetryPolicy, status_error, transport_error};
use crate::errors::ProviderError;

/// Client for OpenAI-compatible chat completion endpoints
///
/// Serves DeepSeek, OpenAI and LM Studio: all three accept the same
/// `POST {endpoint}/chat/completions` request.
pub struct OpenAiCompatible {
    /// HTTP client for API requests
    client: Client,
    /// Provider label for logs and errors
    label: String,
    /// Base URL, e.g. `https://api.deepseek.com/v1`
    endpoint: String,
    /// Bearer credential; empty for local servers
    api_key: String,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    pub content: Option<String>,
}

/// Vendor error envelope: `{"error": {"message": "..."}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl OpenAiCompatible {
    pub fn new(
        label: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
            label: label.into(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.3,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Full completions URL
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    /// Vendor message from an error body, or a generic status line
    pub fn error_message(status: u16, body: &str) -> String {
        serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error)
            .and_then(|error| error.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP {}", status))
    }

    /// Reply text of a successful response
    pub fn extract_content(response: ChatCompletionResponse) -> Result<String, ProviderError> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ProviderError::ParseError("response has no choices[0].message.content".to_string()))
    }

    async fn send_once(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let mut builder = self.client.post(self.completions_url()).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().await.map_err(|e| transport_error(&self.label, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = Self::error_message(status.as_u16(), &body);
            error!("{} API error ({}): {}", self.label, status, message);
            return Err(status_error(status.as_u16(), message));
        }

        let parsed = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("{}: {}", self.label, e)))?;

        Self::extract_content(parsed)
    }
}

#[async_trait]
impl ModelCaller for OpenAiCompatible {
    async fn call(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        debug!("{} request with {} messages to {}", self.label, messages.len(), self.model);
        self.retry.run(&self.label, || self.send_once(messages)).await
    }

    fn name(&self) -> &str {
        &self.label
    }
}
