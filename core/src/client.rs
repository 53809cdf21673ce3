use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::{ProviderConfig, TwoStepConfig};
use crate::error::{ProviderError, ProviderFailure};
use crate::prompt::Turn;
use crate::retry::RetryPolicy;
use crate::{Result, TwoStepError};

/// Chat Completions request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Response with a single choice carrying `text`.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            model: None,
            choices: vec![Choice {
                message: ChoiceMessage {
                    content: Some(text.into()),
                },
            }],
            usage: None,
        }
    }

    /// Trimmed text of the first choice, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// The single network-call primitive the completion client retries around.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse> {
        (**self).send(request).await
    }
}

/// OpenAI-compatible `/chat/completions` over HTTP
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(cfg: &ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|e| TwoStepError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
        })
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse> {
        debug!(target = "completion_client", url = %self.url, model = %request.model, "POST chat completion");

        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                classify_status(status),
                format!("status={status} body={body}"),
            )
            .into());
        }

        let parsed = resp.json::<ChatResponse>().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::new(ProviderFailure::Timeout, e.to_string())
            } else {
                ProviderError::new(
                    ProviderFailure::MalformedResponse,
                    format!("Failed to parse Chat Completions JSON: {e}"),
                )
            }
        })?;
        Ok(parsed)
    }
}

fn classify_status(status: StatusCode) -> ProviderFailure {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderFailure::RateLimited,
        StatusCode::REQUEST_TIMEOUT => ProviderFailure::Timeout,
        s if s.is_server_error() => ProviderFailure::ServerError(s.as_u16()),
        s => ProviderFailure::Rejected(s.as_u16()),
    }
}

fn classify_send_error(e: reqwest::Error) -> ProviderError {
    let kind = if e.is_timeout() {
        ProviderFailure::Timeout
    } else {
        ProviderFailure::Network
    };
    ProviderError::new(kind, format!("Chat Completions HTTP error: {e}"))
}

/// Turns a list of conversation turns into the first choice's trimmed text,
/// retrying transient provider failures according to the configured policy.
pub struct CompletionClient<T> {
    transport: T,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl<T: ChatTransport> CompletionClient<T> {
    pub fn new(transport: T, cfg: &TwoStepConfig) -> Self {
        Self {
            transport,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            retry: cfg.retry.clone(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn request(&self, turns: Vec<Turn>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: turns,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Contract:
    /// - Output: text of the first choice, trimmed
    /// - Transient provider errors are retried; the last one is returned unchanged
    /// - Blank text fails with `EmptyResponse` without retrying
    pub async fn complete(&self, turns: Vec<Turn>) -> Result<String> {
        let request = self.request(turns);
        let mut failed = 0u32;

        let response = loop {
            match self.transport.send(&request).await {
                Ok(resp) => break resp,
                Err(e) if e.is_transient() => {
                    failed += 1;
                    if !self.retry.should_retry(failed) {
                        error!(target = "completion_client", attempts = failed, error = %e, "Giving up after transient failures");
                        return Err(e);
                    }
                    let delay = self.retry.delay_for(failed, &mut rand::thread_rng());
                    warn!(target = "completion_client", attempt = failed, ?delay, error = %e, "Transient provider error; retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        };

        if let Some(usage) = &response.usage {
            debug!(
                target = "completion_client",
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion usage"
            );
        }

        match response.first_text() {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(TwoStepError::EmptyResponse),
        }
    }
}
