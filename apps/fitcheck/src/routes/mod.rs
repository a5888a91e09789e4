pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::session::handlers;
use crate::state::AppState;

/// Headroom for multipart framing on top of the largest accepted document.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_file_size_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(health::health_handler))
        // Session
        .route("/api/v1/session", get(handlers::handle_get_session))
        .route(
            "/api/v1/session/candidate",
            put(handlers::handle_set_candidate),
        )
        // Documents and similarity
        .route(
            "/api/v1/documents/:role",
            post(handlers::handle_upload_document).get(handlers::handle_get_document),
        )
        .route("/api/v1/similarity", get(handlers::handle_get_similarity))
        // Transcript
        .route(
            "/api/v1/transcript",
            get(handlers::handle_get_transcript)
                .post(handlers::handle_append_message)
                .delete(handlers::handle_clear_transcript),
        )
        // Analysis and reports
        .route("/api/v1/analysis", post(handlers::handle_analyze))
        .route("/api/v1/reports", get(handlers::handle_list_reports))
        .route("/api/v1/reports/:id", get(handlers::handle_get_report))
        .route(
            "/api/v1/reports/:id/export",
            get(handlers::handle_export_report),
        )
        // Interview assistance
        .route(
            "/api/v1/interview/suggestion",
            post(handlers::handle_suggest_follow_up),
        )
        .route(
            "/api/v1/interview/questions",
            post(handlers::handle_interview_questions),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
