/// LLM Client — the single point of entry for all language-model calls in fitcheck.
///
/// ARCHITECTURAL RULE: No other module may talk to the chat-completions API directly.
/// Analysis and interview prompts go through the `LanguageModel` trait so tests can
/// substitute a scripted model.
///
/// The client makes exactly one HTTP attempt per call. Retrying is the caller's decision,
/// see `retry::with_backoff`.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::LlmSettings;
use crate::errors::ModelServiceErrorKind;

pub mod prompts;
pub mod retry;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited by the model service")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Model service did not answer within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Embedding backend failed: {0}")]
    Backend(String),
}

impl LlmError {
    pub fn kind(&self) -> ModelServiceErrorKind {
        match self {
            LlmError::Http(e) if e.is_timeout() => ModelServiceErrorKind::Timeout,
            LlmError::Http(e) if e.is_decode() => ModelServiceErrorKind::MalformedResponse,
            LlmError::Http(_) => ModelServiceErrorKind::Transport,
            LlmError::Api { status: 429, .. } => ModelServiceErrorKind::RateLimited,
            LlmError::Api { .. } => ModelServiceErrorKind::Transport,
            LlmError::RateLimited { .. } => ModelServiceErrorKind::RateLimited,
            LlmError::Timeout(_) => ModelServiceErrorKind::Timeout,
            LlmError::Parse(_) | LlmError::EmptyContent => ModelServiceErrorKind::MalformedResponse,
            LlmError::Backend(_) => ModelServiceErrorKind::Transport,
        }
    }

    /// Timeouts, rate limits, connection failures and 5xx responses are retryable.
    /// Client errors (bad key, bad request) and malformed content are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(e) => !e.is_decode() && !e.is_builder(),
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::RateLimited { .. } | LlmError::Timeout(_) => true,
            LlmError::Parse(_) | LlmError::EmptyContent | LlmError::Backend(_) => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// "Send prompt, receive text" contract for the language-model service.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Sends one prompt with a system instruction and returns the model's text.
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError>;
}

/// Runs one `complete` call bounded by `timeout`. Expiry maps to `LlmError::Timeout`.
pub async fn complete_with_timeout(
    llm: &dyn LanguageModel,
    prompt: &str,
    system: &str,
    timeout: Duration,
) -> Result<String, LlmError> {
    tokio::time::timeout(timeout, llm.complete(prompt, system))
        .await
        .map_err(|_| LlmError::Timeout(timeout))?
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatRequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Extracts the text content of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Chat-completions client for any OpenAI-compatible endpoint (Groq by default).
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    fn model_name(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let request_body = ChatRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            messages: vec![
                ChatRequestMessage {
                    role: "system",
                    content: system,
                },
                ChatRequestMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = parse_retry_after(response.headers());
            return Err(LlmError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let chat: ChatResponse = serde_json::from_str(&body)?;

        if let Some(usage) = &chat.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        chat.text().map(str::to_owned).ok_or(LlmError::EmptyContent)
    }
}

/// Parses a `Retry-After` header expressed in seconds.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Removes markdown bold markers (`**text**` → `text`) and trims the response.
pub fn strip_markdown_emphasis(text: &str) -> String {
    text.replace("**", "").trim().to_string()
}
