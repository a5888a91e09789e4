use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::document::DEFAULT_MAX_FILE_SIZE;
use crate::llm_client::retry::RetryPolicy;

const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_LLM_MODEL: &str = "llama3-8b-8192";
const DEFAULT_EMBEDDING_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_LOCAL_EMBEDDING_MODEL: &str = "all-minilm-l6-v2";

/// Settings for the chat-completions service.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// Sampling temperature. 0.0 keeps identical prompts as close to identical output as the
    /// service allows.
    pub temperature: f32,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProviderKind {
    /// OpenAI-compatible `/embeddings` endpoint.
    OpenAi,
    /// In-process all-MiniLM-L6-v2 via fastembed (`local-embeddings` feature).
    Local,
}

impl FromStr for EmbeddingProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(EmbeddingProviderKind::OpenAi),
            "local" => Ok(EmbeddingProviderKind::Local),
            other => bail!("Unknown embedding provider '{other}' (expected 'openai' or 'local')"),
        }
    }
}

/// Settings for the embedding service used by the similarity scorer.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Per-text character budget; longer texts are head-truncated before embedding.
    pub max_chars: usize,
    pub timeout: Duration,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    /// Per-document character budget inside analysis prompts.
    pub prompt_max_document_chars: usize,
    /// Character budget for the conversation inside prompts; the latest turns are kept.
    pub prompt_max_transcript_chars: usize,
    pub max_file_size_bytes: u64,
    pub retry: RetryPolicy,
    pub bind_addr: IpAddr,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let api_key = require_env("LLM_API_KEY")
            .or_else(|_| require_env("GROQ_API_KEY"))
            .context("Set LLM_API_KEY (or GROQ_API_KEY) to call the language model")?;

        let llm_timeout = Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", 30u64)?);

        let llm = LlmSettings {
            api_key,
            base_url: env_or("LLM_BASE_URL", DEFAULT_LLM_BASE_URL),
            model: env_or("LLM_MODEL", DEFAULT_LLM_MODEL),
            max_tokens: parse_env("LLM_MAX_TOKENS", 2048u32)?,
            temperature: parse_env("LLM_TEMPERATURE", 0.0f32)?,
            timeout: llm_timeout,
        };

        let provider: EmbeddingProviderKind = env_or("EMBEDDING_PROVIDER", "openai").parse()?;
        let default_model = match provider {
            EmbeddingProviderKind::OpenAi => DEFAULT_EMBEDDING_MODEL,
            EmbeddingProviderKind::Local => DEFAULT_LOCAL_EMBEDDING_MODEL,
        };

        let embedding = EmbeddingSettings {
            provider,
            base_url: env_or("EMBEDDING_BASE_URL", DEFAULT_EMBEDDING_BASE_URL),
            api_key: std::env::var("EMBEDDING_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok(),
            model: env_or("EMBEDDING_MODEL", default_model),
            max_chars: parse_env("EMBEDDING_MAX_CHARS", 8000usize)?,
            timeout: llm_timeout,
        };

        if embedding.provider == EmbeddingProviderKind::OpenAi && embedding.api_key.is_none() {
            bail!("EMBEDDING_PROVIDER=openai requires EMBEDDING_API_KEY (or OPENAI_API_KEY)");
        }

        let retry = RetryPolicy {
            max_attempts: parse_env("RETRY_MAX_ATTEMPTS", 3u32)?,
            ..RetryPolicy::default()
        };

        Ok(Config {
            llm,
            embedding,
            prompt_max_document_chars: parse_env("PROMPT_MAX_DOCUMENT_CHARS", 12_000usize)?,
            prompt_max_transcript_chars: parse_env("PROMPT_MAX_TRANSCRIPT_CHARS", 16_000usize)?,
            max_file_size_bytes: parse_env("MAX_FILE_SIZE_BYTES", DEFAULT_MAX_FILE_SIZE)?,
            retry,
            bind_addr: parse_env("BIND_ADDR", IpAddr::from([127, 0, 0, 1]))?,
            port: parse_env("PORT", 8080u16)?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}
