use std::fmt;
use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;

/// Why a source document could not be turned into a `Document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreadableReason {
    Corrupt,
    Encrypted,
    Empty,
    TooLarge,
    Io,
    Unsupported,
}

impl UnreadableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnreadableReason::Corrupt => "corrupt",
            UnreadableReason::Encrypted => "encrypted",
            UnreadableReason::Empty => "empty",
            UnreadableReason::TooLarge => "too_large",
            UnreadableReason::Io => "io",
            UnreadableReason::Unsupported => "unsupported",
        }
    }
}

/// Which side of a similarity comparison had no usable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSide {
    Resume,
    JobDescription,
}

impl TextSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextSide::Resume => "resume",
            TextSide::JobDescription => "job_description",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreconditionReason {
    /// The transcript lacks a recruiter or a candidate message.
    InsufficientConversation,
    /// Another `analyze` call on the same session has not finished.
    AnalysisInProgress,
    /// The job description or resume has not been loaded yet.
    MissingDocument,
}

impl PreconditionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreconditionReason::InsufficientConversation => "insufficient_conversation",
            PreconditionReason::AnalysisInProgress => "analysis_in_progress",
            PreconditionReason::MissingDocument => "missing_document",
        }
    }
}

/// Classification of a failed language-model or embedding call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelServiceErrorKind {
    Timeout,
    RateLimited,
    Transport,
    MalformedResponse,
}

impl ModelServiceErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelServiceErrorKind::Timeout => "timeout",
            ModelServiceErrorKind::RateLimited => "rate_limited",
            ModelServiceErrorKind::Transport => "transport",
            ModelServiceErrorKind::MalformedResponse => "malformed_response",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(
    UnreadableReason,
    TextSide,
    PreconditionReason,
    ModelServiceErrorKind
);

/// Error type shared by every pipeline operation.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, PipelineError>`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unreadable source {}: {reason} ({detail})", .path.display())]
    UnreadableSource {
        path: PathBuf,
        reason: UnreadableReason,
        detail: String,
    },

    #[error("Insufficient text: {side} is empty")]
    InsufficientText { side: TextSide },

    #[error("Message text is empty")]
    EmptyMessage,

    #[error("Precondition failed: {reason}")]
    Precondition { reason: PreconditionReason },

    #[error("Model service error ({kind}): {message}")]
    ModelService {
        kind: ModelServiceErrorKind,
        retryable: bool,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn unreadable(
        path: impl Into<PathBuf>,
        reason: UnreadableReason,
        detail: impl Into<String>,
    ) -> Self {
        PipelineError::UnreadableSource {
            path: path.into(),
            reason,
            detail: detail.into(),
        }
    }

    pub fn precondition(reason: PreconditionReason) -> Self {
        PipelineError::Precondition { reason }
    }

    /// Machine-readable error code.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::UnreadableSource { .. } => "unreadable_source",
            PipelineError::InsufficientText { .. } => "insufficient_text",
            PipelineError::EmptyMessage => "empty_message",
            PipelineError::Precondition { .. } => "precondition",
            PipelineError::ModelService { .. } => "model_service",
            PipelineError::NotFound(_) => "not_found",
            PipelineError::Validation(_) => "validation",
            PipelineError::Internal(_) => "internal",
        }
    }

    /// The finer-grained reason code (`empty`, `analysis_in_progress`, `timeout`, ...), if any.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            PipelineError::UnreadableSource { reason, .. } => Some(reason.as_str()),
            PipelineError::InsufficientText { side } => Some(side.as_str()),
            PipelineError::Precondition { reason } => Some(reason.as_str()),
            PipelineError::ModelService { kind, .. } => Some(kind.as_str()),
            _ => None,
        }
    }

    /// True when the same call may succeed if repeated later without any input change.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::ModelService { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        PipelineError::ModelService {
            kind: err.kind(),
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = match &self {
            PipelineError::UnreadableSource { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::InsufficientText { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::EmptyMessage => StatusCode::BAD_REQUEST,
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::Precondition { .. } => StatusCode::CONFLICT,
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::ModelService { kind, .. } => {
                tracing::error!("Model service error: {self}");
                match kind {
                    ModelServiceErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    ModelServiceErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                    _ => StatusCode::BAD_GATEWAY,
                }
            }
            PipelineError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self {
            PipelineError::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.kind(),
                "reason": self.reason(),
                "retryable": self.is_retryable(),
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_reason_are_machine_readable() {
        let err = PipelineError::precondition(PreconditionReason::AnalysisInProgress);
        assert_eq!(err.kind(), "precondition");
        assert_eq!(err.reason(), Some("analysis_in_progress"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unreadable_display_mentions_path_and_reason() {
        let err = PipelineError::unreadable("/tmp/cv.pdf", UnreadableReason::Empty, "no text");
        let msg = err.to_string();
        assert!(msg.contains("/tmp/cv.pdf"));
        assert!(msg.contains("empty"));
    }

    #[test]
    fn test_llm_timeout_maps_to_retryable_model_service_error() {
        let err: PipelineError = LlmError::Timeout(std::time::Duration::from_secs(30)).into();
        assert_eq!(err.reason(), Some("timeout"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_llm_client_error_is_not_retryable() {
        let err: PipelineError = LlmError::Api {
            status: 401,
            message: "bad key".to_string(),
        }
        .into();
        assert_eq!(err.reason(), Some("transport"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_precondition_renders_conflict() {
        let response =
            PipelineError::precondition(PreconditionReason::InsufficientConversation).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
