use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::retry::RetryPolicy;
use crate::session::Session;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The single evaluation session this front end serves.
    pub session: Arc<Session>,
    pub config: Arc<Config>,
    /// Backoff applied to interview-assistant calls. Analysis is never retried server-side.
    pub retry: RetryPolicy,
}
