//! Similarity Scorer — embeds a resume and a job description and rates their fit on 0–10.
//!
//! score = (cosine + 1) × 5, rounded to one decimal. Texts beyond the embedder's character
//! budget are head-truncated and the result records that it happened.

pub mod embedder;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::document::Document;
use crate::errors::{ModelServiceErrorKind, PipelineError, TextSide};
use crate::llm_client::prompts::truncate_head;

pub use embedder::{create_embedder, Embedder, OpenAiEmbedder};

/// A derived score. Replaced, never mutated, when either document changes.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityResult {
    pub score: f32,
    pub truncated: bool,
    pub computed_at: DateTime<Utc>,
    #[serde(skip)]
    pub resume: Option<Arc<Document>>,
    #[serde(skip)]
    pub job_description: Option<Arc<Document>>,
}

impl SimilarityResult {
    /// True when this result was computed from exactly these two documents.
    pub fn is_for(&self, resume: &Arc<Document>, job_description: &Arc<Document>) -> bool {
        matches!(&self.resume, Some(r) if Arc::ptr_eq(r, resume))
            && matches!(&self.job_description, Some(j) if Arc::ptr_eq(j, job_description))
    }
}

#[derive(Clone)]
pub struct SimilarityScorer {
    embedder: Arc<dyn Embedder>,
}

impl SimilarityScorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Scores two loaded documents and keeps references to them in the result.
    pub async fn score(
        &self,
        resume: Arc<Document>,
        job_description: Arc<Document>,
    ) -> Result<SimilarityResult, PipelineError> {
        let mut result = self
            .score_texts(resume.text(), job_description.text())
            .await?;
        result.resume = Some(resume);
        result.job_description = Some(job_description);
        Ok(result)
    }

    /// Scores two raw texts. Empty text on either side is an error, not a zero score.
    pub async fn score_texts(
        &self,
        resume_text: &str,
        jd_text: &str,
    ) -> Result<SimilarityResult, PipelineError> {
        if resume_text.trim().is_empty() {
            return Err(PipelineError::InsufficientText {
                side: TextSide::Resume,
            });
        }
        if jd_text.trim().is_empty() {
            return Err(PipelineError::InsufficientText {
                side: TextSide::JobDescription,
            });
        }

        let budget = self.embedder.max_chars();
        let (resume_head, resume_cut) = truncate_head(resume_text, budget);
        let (jd_head, jd_cut) = truncate_head(jd_text, budget);

        let inputs = vec![resume_head.to_string(), jd_head.to_string()];
        let vectors = self.embedder.embed(&inputs).await?;

        let (a, b) = match vectors.as_slice() {
            [a, b] => (a, b),
            other => {
                return Err(malformed(format!(
                    "embedder returned {} vectors for 2 texts",
                    other.len()
                )))
            }
        };

        let cosine = cosine_similarity(a, b)
            .ok_or_else(|| malformed("embedding vectors are zero or mismatched".to_string()))?;
        let score = rescale(cosine);

        info!(
            "Similarity {:.1}/10 via {} (cosine {:.4}, truncated: {})",
            score,
            self.embedder.model_name(),
            cosine,
            resume_cut || jd_cut
        );

        Ok(SimilarityResult {
            score,
            truncated: resume_cut || jd_cut,
            computed_at: Utc::now(),
            resume: None,
            job_description: None,
        })
    }
}

fn malformed(message: String) -> PipelineError {
    PipelineError::ModelService {
        kind: ModelServiceErrorKind::MalformedResponse,
        retryable: false,
        message,
    }
}

/// Cosine similarity in [-1, 1], accumulated in f64. `None` for empty, zero-norm or
/// mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((dot / denom).clamp(-1.0, 1.0))
}

/// Maps cosine [-1, 1] onto [0, 10] with one decimal place.
pub fn rescale(cosine: f64) -> f32 {
    let score = ((cosine + 1.0) * 5.0).clamp(0.0, 10.0);
    ((score * 10.0).round() / 10.0) as f32
}
