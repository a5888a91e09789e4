//! Scripted stand-ins for the model and embedding services.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::config::{Config, EmbeddingProviderKind, EmbeddingSettings, LlmSettings};
use crate::document::DEFAULT_MAX_FILE_SIZE;
use crate::llm_client::retry::RetryPolicy;
use crate::llm_client::{LanguageModel, LlmError};
use crate::similarity::Embedder;

/// Returns scripted results in order and records every prompt. When gated, each call waits
/// for a `Notify` permit before answering.
pub struct FakeLanguageModel {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl FakeLanguageModel {
    pub fn with_responses<'a>(responses: impl IntoIterator<Item = &'a str>) -> Self {
        Self::with_results(responses.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn with_results(results: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(results.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeLanguageModel {
    fn model_name(&self) -> &str {
        "fake-model"
    }

    async fn complete(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(LlmError::Backend("no scripted response left".to_string())))
    }
}

const FAKE_DIMS: usize = 64;

/// Deterministic hashed bag-of-words embedding. Identical text gives identical vectors and
/// shared vocabulary raises cosine similarity.
pub struct FakeEmbedder {
    max_chars: usize,
}

impl Default for FakeEmbedder {
    fn default() -> Self {
        Self { max_chars: 8000 }
    }
}

impl FakeEmbedder {
    pub fn with_max_chars(max_chars: usize) -> Self {
        Self { max_chars }
    }

    fn embed_one(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; FAKE_DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % FAKE_DIMS as u64) as usize;
            vector[bucket] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-embedder"
    }

    fn max_chars(&self) -> usize {
        self.max_chars
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|t| Self::embed_one(t)).collect())
    }
}

pub fn test_config() -> Config {
    Config {
        llm: LlmSettings {
            api_key: "test-key".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            model: "fake-model".to_string(),
            max_tokens: 512,
            temperature: 0.0,
            timeout: Duration::from_secs(5),
        },
        embedding: EmbeddingSettings {
            provider: EmbeddingProviderKind::OpenAi,
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: Some("test-key".to_string()),
            model: "fake-embedder".to_string(),
            max_chars: 8000,
            timeout: Duration::from_secs(5),
        },
        prompt_max_document_chars: 12_000,
        prompt_max_transcript_chars: 16_000,
        max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
        retry: RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        },
        bind_addr: IpAddr::from([127, 0, 0, 1]),
        port: 0,
        rust_log: "debug".to_string(),
    }
}
