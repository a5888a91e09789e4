//! Embedding backends.
//!
//! - `OpenAiEmbedder` calls any OpenAI-compatible `/embeddings` endpoint (single attempt).
//! - `LocalEmbedder` runs all-MiniLM-L6-v2 in process via fastembed (`local-embeddings` feature).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EmbeddingProviderKind, EmbeddingSettings};
use crate::llm_client::LlmError;

/// Turns texts into fixed-dimension vectors. Must be deterministic for identical input.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    /// Character budget per text; longer inputs are head-truncated by the caller.
    fn max_chars(&self) -> usize;

    /// Embeds every text, returning vectors in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}

/// Builds the backend selected in configuration.
pub fn create_embedder(settings: &EmbeddingSettings) -> anyhow::Result<Box<dyn Embedder>> {
    match settings.provider {
        EmbeddingProviderKind::OpenAi => Ok(Box::new(OpenAiEmbedder::new(settings)?)),
        #[cfg(feature = "local-embeddings")]
        EmbeddingProviderKind::Local => Ok(Box::new(local::LocalEmbedder::new(settings)?)),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingProviderKind::Local => anyhow::bail!(
            "EMBEDDING_PROVIDER=local requires building with --features local-embeddings"
        ),
    }
}

// ── OpenAI-compatible HTTP backend ───────────────────────────────────────────

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_chars: usize,
}

impl OpenAiEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", settings.base_url.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            max_chars: settings.max_chars,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn max_chars(&self) -> usize {
        self.max_chars
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(LlmError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let vectors = parse_embedding_response(&body, texts.len())?;
        debug!(
            "Embedded {} texts with {} ({} dims)",
            vectors.len(),
            self.model,
            vectors.first().map(Vec::len).unwrap_or(0)
        );
        Ok(vectors)
    }
}

/// Parses `data[].embedding`, ordered by `index`, and checks the count and dimensions.
fn parse_embedding_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>, LlmError> {
    let mut parsed: EmbeddingResponse = serde_json::from_str(body)?;
    parsed.data.sort_by_key(|item| item.index);

    if parsed.data.len() != expected {
        return Err(LlmError::Backend(format!(
            "expected {expected} embeddings, got {}",
            parsed.data.len()
        )));
    }

    let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|i| i.embedding).collect();
    let dims = vectors.first().map(Vec::len).unwrap_or(0);
    if dims == 0 || vectors.iter().any(|v| v.len() != dims) {
        return Err(LlmError::Backend(
            "embedding vectors are empty or differ in dimension".to_string(),
        ));
    }
    Ok(vectors)
}

// ── Local fastembed backend ──────────────────────────────────────────────────

#[cfg(feature = "local-embeddings")]
mod local {
    use std::sync::{Arc, Mutex, PoisonError};

    use async_trait::async_trait;
    use tracing::info;

    use super::Embedder;
    use crate::config::EmbeddingSettings;
    use crate::llm_client::LlmError;

    /// `TextEmbedding::embed` needs `&mut self`, so the model sits behind a mutex.
    pub struct LocalEmbedder {
        model: Arc<Mutex<fastembed::TextEmbedding>>,
        model_name: String,
        max_chars: usize,
    }

    impl LocalEmbedder {
        pub fn new(settings: &EmbeddingSettings) -> anyhow::Result<Self> {
            let model = match settings.model.as_str() {
                "all-minilm-l6-v2" => fastembed::EmbeddingModel::AllMiniLML6V2,
                "bge-small-en-v1.5" => fastembed::EmbeddingModel::BGESmallENV15,
                other => anyhow::bail!("Unsupported local embedding model '{other}'"),
            };
            let embedding = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(model).with_show_download_progress(false),
            )
            .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {e}"))?;
            info!("Local embedding model {} loaded", settings.model);

            Ok(Self {
                model: Arc::new(Mutex::new(embedding)),
                model_name: settings.model.clone(),
                max_chars: settings.max_chars,
            })
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        fn model_name(&self) -> &str {
            &self.model_name
        }

        fn max_chars(&self) -> usize {
            self.max_chars
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();
            tokio::task::spawn_blocking(move || {
                let mut guard = model.lock().unwrap_or_else(PoisonError::into_inner);
                guard
                    .embed(texts, None)
                    .map_err(|e| LlmError::Backend(format!("local embedding failed: {e}")))
            })
            .await
            .map_err(|e| LlmError::Backend(format!("embedding task aborted: {e}")))?
        }
    }
}

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ModelServiceErrorKind;

    #[test]
    fn test_parse_embedding_response_orders_by_index() {
        let body = r#"{"data":[
            {"index":1,"embedding":[0.0,1.0]},
            {"index":0,"embedding":[1.0,0.0]}
        ],"model":"text-embedding-3-small"}"#;
        let vectors = parse_embedding_response(body, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_embedding_response_count_mismatch() {
        let body = r#"{"data":[{"index":0,"embedding":[1.0]}]}"#;
        let err = parse_embedding_response(body, 2).unwrap_err();
        assert!(matches!(err, LlmError::Backend(_)));
    }

    #[test]
    fn test_parse_embedding_response_dimension_mismatch() {
        let body = r#"{"data":[
            {"index":0,"embedding":[1.0,2.0]},
            {"index":1,"embedding":[1.0]}
        ]}"#;
        assert!(parse_embedding_response(body, 2).is_err());
    }

    #[test]
    fn test_parse_embedding_response_malformed_json() {
        let err = parse_embedding_response("not json", 1).unwrap_err();
        assert_eq!(err.kind(), ModelServiceErrorKind::MalformedResponse);
    }

    #[cfg(not(feature = "local-embeddings"))]
    #[test]
    fn test_local_provider_requires_feature() {
        let settings = EmbeddingSettings {
            provider: EmbeddingProviderKind::Local,
            base_url: String::new(),
            api_key: None,
            model: "all-minilm-l6-v2".to_string(),
            max_chars: 100,
            timeout: Duration::from_secs(1),
        };
        assert!(create_embedder(&settings).is_err());
    }
}
