use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::document::{Document, DocumentRole, SourceFormat};
use crate::errors::PipelineError;
use crate::llm_client::retry::with_backoff;
use crate::session::{SessionSummary, StoredReport};
use crate::similarity::SimilarityResult;
use crate::state::AppState;
use crate::transcript::{ChatMessage, Sender, TranscriptSnapshot};

/// GET /api/v1/session
pub async fn handle_get_session(State(state): State<AppState>) -> Json<SessionSummary> {
    Json(state.session.summary())
}

#[derive(Deserialize)]
pub struct CandidateRequest {
    pub name: Option<String>,
}

/// PUT /api/v1/session/candidate
pub async fn handle_set_candidate(
    State(state): State<AppState>,
    Json(req): Json<CandidateRequest>,
) -> Result<Json<SessionSummary>, PipelineError> {
    state.session.set_candidate(req.name)?;
    Ok(Json(state.session.summary()))
}

// ────────────────────────────────────────────────────────────────────────────
// Documents
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct DocumentView {
    pub role: DocumentRole,
    #[serde(flatten)]
    pub document: Document,
    pub chars: usize,
}

impl DocumentView {
    fn new(role: DocumentRole, document: &Document) -> Self {
        Self {
            role,
            chars: document.text().chars().count(),
            document: document.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct DocumentUploadResponse {
    #[serde(flatten)]
    pub document: DocumentView,
    /// Present once both documents are loaded and scoring succeeded.
    pub similarity: Option<SimilarityResult>,
    pub similarity_error: Option<String>,
}

fn parse_format(raw: &str) -> Result<SourceFormat, PipelineError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pdf" => Ok(SourceFormat::Pdf),
        "text" | "txt" => Ok(SourceFormat::Text),
        other => Err(PipelineError::Validation(format!(
            "Unknown format '{other}' (expected 'pdf' or 'text')"
        ))),
    }
}

/// POST /api/v1/documents/:role
///
/// Multipart form: `file` (required), `format` (optional, `pdf` or `text`).
pub async fn handle_upload_document(
    State(state): State<AppState>,
    Path(role): Path<DocumentRole>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentUploadResponse>), PipelineError> {
    let mut file = None;
    let mut format = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PipelineError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| PipelineError::Validation(format!("Failed to read upload: {e}")))?;
                file = Some((name, bytes));
            }
            Some("format") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| PipelineError::Validation(format!("Invalid format field: {e}")))?;
                format = Some(parse_format(&raw)?);
            }
            _ => {}
        }
    }

    let (name, bytes) =
        file.ok_or_else(|| PipelineError::Validation("Missing 'file' field".to_string()))?;
    let document = state
        .session
        .load_document_bytes(role, &name, bytes, format)
        .await?;

    let summary = state.session.summary();
    let (similarity, similarity_error) = if summary.job_description_loaded && summary.resume_loaded {
        match state.session.refresh_similarity().await {
            Ok(result) => (Some(result), None),
            Err(e) => {
                warn!("Similarity scoring failed after upload: {e}");
                (None, Some(e.to_string()))
            }
        }
    } else {
        (None, None)
    };

    Ok((
        StatusCode::CREATED,
        Json(DocumentUploadResponse {
            document: DocumentView::new(role, &document),
            similarity,
            similarity_error,
        }),
    ))
}

/// GET /api/v1/documents/:role
pub async fn handle_get_document(
    State(state): State<AppState>,
    Path(role): Path<DocumentRole>,
) -> Result<Json<DocumentView>, PipelineError> {
    let document = state
        .session
        .document(role)
        .ok_or_else(|| PipelineError::NotFound(format!("No {role:?} document loaded")))?;
    Ok(Json(DocumentView::new(role, &document)))
}

/// GET /api/v1/similarity
///
/// Returns the stored score for the current documents, computing it if needed.
pub async fn handle_get_similarity(
    State(state): State<AppState>,
) -> Result<Json<SimilarityResult>, PipelineError> {
    if let Some(result) = state.session.similarity() {
        return Ok(Json(result));
    }
    Ok(Json(state.session.refresh_similarity().await?))
}

// ────────────────────────────────────────────────────────────────────────────
// Transcript
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AppendMessageRequest {
    pub sender: Sender,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// GET /api/v1/transcript
pub async fn handle_get_transcript(State(state): State<AppState>) -> Json<TranscriptSnapshot> {
    Json(state.session.transcript_snapshot())
}

/// POST /api/v1/transcript
pub async fn handle_append_message(
    State(state): State<AppState>,
    Json(req): Json<AppendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), PipelineError> {
    let message = state
        .session
        .append_message(req.sender, &req.text, req.timestamp)?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// DELETE /api/v1/transcript
pub async fn handle_clear_transcript(State(state): State<AppState>) -> StatusCode {
    state.session.clear_transcript();
    StatusCode::NO_CONTENT
}

// ────────────────────────────────────────────────────────────────────────────
// Analysis and reports
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analysis
///
/// Not retried here: the error body carries `retryable` so the caller decides.
pub async fn handle_analyze(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<StoredReport>), PipelineError> {
    let stored = state.session.analyze().await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /api/v1/reports
pub async fn handle_list_reports(State(state): State<AppState>) -> Json<Vec<StoredReport>> {
    Json(state.session.reports())
}

/// GET /api/v1/reports/:id
pub async fn handle_get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredReport>, PipelineError> {
    Ok(Json(state.session.report(id)?))
}

/// GET /api/v1/reports/:id/export
pub async fn handle_export_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, PipelineError> {
    let text = state.session.export(id)?;
    let disposition = format!("attachment; filename=\"evaluation-{id}.txt\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        text,
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Interview assistance
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SuggestionResponse {
    pub suggestion: String,
}

#[derive(Serialize)]
pub struct QuestionsResponse {
    pub questions: Vec<String>,
}

/// POST /api/v1/interview/suggestion
pub async fn handle_suggest_follow_up(
    State(state): State<AppState>,
) -> Result<Json<SuggestionResponse>, PipelineError> {
    let session = state.session.as_ref();
    let suggestion = with_backoff(&state.retry, move || session.suggest_follow_up()).await?;
    Ok(Json(SuggestionResponse { suggestion }))
}

/// POST /api/v1/interview/questions
pub async fn handle_interview_questions(
    State(state): State<AppState>,
) -> Result<Json<QuestionsResponse>, PipelineError> {
    let session = state.session.as_ref();
    let questions = with_backoff(&state.retry, move || session.interview_questions()).await?;
    Ok(Json(QuestionsResponse { questions }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format(" PDF ").unwrap(), SourceFormat::Pdf);
        assert_eq!(parse_format("txt").unwrap(), SourceFormat::Text);
        assert!(matches!(
            parse_format("docx"),
            Err(PipelineError::Validation(_))
        ));
    }
}
