//! Analysis Orchestrator — one language-model call per analysis request.
//!
//! Flow: precondition check → in-flight claim → prompt → single bounded model call →
//! `report::synthesize`. At most one analysis runs per orchestrator; the claim is an RAII
//! guard, so it is released on success, error, timeout and when the caller drops the future.

pub mod prompts;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::document::Document;
use crate::errors::{ModelServiceErrorKind, PipelineError, PreconditionReason};
use crate::llm_client::prompts::{PromptBudget, RECRUITER_ASSISTANT_SYSTEM};
use crate::llm_client::{complete_with_timeout, strip_markdown_emphasis, LanguageModel};
use crate::report::{synthesize, AnalysisReport};
use crate::transcript::TranscriptSnapshot;

use prompts::build_analysis_prompt;

/// Inputs for one analysis. The transcript is a snapshot taken when the request was built.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub job_description: Arc<Document>,
    pub resume: Arc<Document>,
    pub transcript: TranscriptSnapshot,
}

pub struct AnalysisOrchestrator {
    llm: Arc<dyn LanguageModel>,
    timeout: Duration,
    budget: PromptBudget,
    in_flight: AtomicBool,
}

/// Holds the in-flight flag; clears it on drop.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AnalysisOrchestrator {
    pub fn new(llm: Arc<dyn LanguageModel>, timeout: Duration, budget: PromptBudget) -> Self {
        Self {
            llm,
            timeout,
            budget,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs one analysis.
    ///
    /// Fails with `Precondition` before any network call when the transcript lacks either
    /// side or another analysis is running. Transport failures come back as retryable
    /// `ModelService` errors; a malformed response becomes a degraded report.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport, PipelineError> {
        if !request.transcript.has_both_sides() {
            return Err(PipelineError::precondition(
                PreconditionReason::InsufficientConversation,
            ));
        }

        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or_else(|| {
            PipelineError::precondition(PreconditionReason::AnalysisInProgress)
        })?;

        let prompt = build_analysis_prompt(
            request.job_description.text(),
            request.resume.text(),
            &request.transcript,
            self.budget,
        );

        info!(
            "Requesting analysis from {} ({} messages, prompt {} chars)",
            self.llm.model_name(),
            request.transcript.len(),
            prompt.chars().count()
        );

        let raw = match complete_with_timeout(
            self.llm.as_ref(),
            &prompt,
            RECRUITER_ASSISTANT_SYSTEM,
            self.timeout,
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) if e.kind() == ModelServiceErrorKind::MalformedResponse => {
                warn!("Analysis response unusable, returning degraded report: {e}");
                return Ok(AnalysisReport::degraded(String::new(), e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let report = synthesize(&strip_markdown_emphasis(&raw));
        if report.is_degraded() {
            warn!("Analysis response had no usable text, returning degraded report");
        } else {
            info!(
                "Analysis complete: recommendation={}, {} key insights",
                report.recommendation,
                report.key_insights.len()
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Notify;

    use super::*;
    use crate::llm_client::LlmError;
    use crate::report::{Recommendation, SpanCategory};
    use crate::test_support::FakeLanguageModel;
    use crate::transcript::{Sender, TranscriptStore};

    const PROCEED_RESPONSE: &str = "\
**1. Key Insights from Conversation:**
- Built production axum services
- Explains ownership clearly
- Enjoys mentoring

**4. FINAL RECOMMENDATION:** PROCEED TO INTERVIEW
**5. Confidence Level:** Medium";

    fn request(messages: &[(Sender, &str)]) -> AnalysisRequest {
        let store = TranscriptStore::new();
        for (sender, text) in messages {
            store.append(*sender, text, None).unwrap();
        }
        AnalysisRequest {
            job_description: Arc::new(Document::from_text("jd.txt", "Backend Rust role").unwrap()),
            resume: Arc::new(Document::from_text("cv.txt", "Rust engineer, 6 years").unwrap()),
            transcript: store.snapshot(),
        }
    }

    fn full_request() -> AnalysisRequest {
        request(&[
            (Sender::Recruiter, "What have you built with Rust?"),
            (Sender::Candidate, "Mostly axum services."),
        ])
    }

    fn orchestrator(model: Arc<FakeLanguageModel>) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(model, Duration::from_secs(30), PromptBudget::default())
    }

    #[tokio::test]
    async fn test_analyze_parses_model_output() {
        let model = Arc::new(FakeLanguageModel::with_responses([PROCEED_RESPONSE]));
        let report = orchestrator(Arc::clone(&model))
            .analyze(&full_request())
            .await
            .unwrap();

        assert_eq!(report.recommendation, Recommendation::Proceed);
        assert_eq!(report.key_insights.len(), 3);
        assert!(!report.raw_text.contains("**"));
        assert!(report
            .highlighted_spans
            .iter()
            .any(|s| s.category == SpanCategory::Proceed));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_prompt_contains_documents_and_transcript() {
        let model = Arc::new(FakeLanguageModel::with_responses([PROCEED_RESPONSE]));
        orchestrator(Arc::clone(&model))
            .analyze(&full_request())
            .await
            .unwrap();
        let prompt = &model.prompts()[0];
        assert!(prompt.contains("Backend Rust role"));
        assert!(prompt.contains("Rust engineer, 6 years"));
        assert!(prompt.contains("Candidate: Mostly axum services."));
    }

    #[tokio::test]
    async fn test_empty_or_one_sided_transcript_rejected_without_call() {
        let model = Arc::new(FakeLanguageModel::with_responses([PROCEED_RESPONSE]));
        let orch = orchestrator(Arc::clone(&model));

        for req in [
            request(&[]),
            request(&[(Sender::Recruiter, "Hello?"), (Sender::Recruiter, "Anyone?")]),
            request(&[(Sender::Candidate, "Hi!")]),
        ] {
            let err = orch.analyze(&req).await.unwrap_err();
            assert_eq!(err.reason(), Some("insufficient_conversation"));
        }
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_analyze_while_pending_is_rejected() {
        let gate = Arc::new(Notify::new());
        let model = Arc::new(
            FakeLanguageModel::with_responses([PROCEED_RESPONSE]).gated(Arc::clone(&gate)),
        );
        let orch = Arc::new(orchestrator(Arc::clone(&model)));
        let req = full_request();

        let first = tokio::spawn({
            let orch = Arc::clone(&orch);
            let req = req.clone();
            async move { orch.analyze(&req).await }
        });
        while model.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let err = orch.analyze(&req).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Precondition {
                reason: PreconditionReason::AnalysisInProgress
            }
        ));

        gate.notify_one();
        let report = first.await.unwrap().unwrap();
        assert_eq!(report.recommendation, Recommendation::Proceed);
        assert!(!orch.is_busy());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_analysis_releases_flag() {
        let model = Arc::new(
            FakeLanguageModel::with_responses([PROCEED_RESPONSE]).gated(Arc::new(Notify::new())),
        );
        let orch = orchestrator(model);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), orch.analyze(&full_request())).await;
        assert!(abandoned.is_err());
        assert!(!orch.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_retryable_transport_failure() {
        let model = Arc::new(
            FakeLanguageModel::with_responses([PROCEED_RESPONSE]).gated(Arc::new(Notify::new())),
        );
        let orch = AnalysisOrchestrator::new(model, Duration::from_secs(5), PromptBudget::default());

        let err = orch.analyze(&full_request()).await.unwrap_err();
        assert_eq!(err.reason(), Some("timeout"));
        assert!(err.is_retryable());
        assert!(!orch.is_busy());
    }

    #[tokio::test]
    async fn test_transport_error_is_surfaced() {
        let model = Arc::new(FakeLanguageModel::with_results(vec![Err(LlmError::Api {
            status: 503,
            message: "overloaded".to_string(),
        })]));
        let err = orchestrator(model).analyze(&full_request()).await.unwrap_err();
        assert_eq!(err.reason(), Some("transport"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_response_yields_degraded_report() {
        let model = Arc::new(FakeLanguageModel::with_results(vec![
            Err(LlmError::EmptyContent),
            Ok("  ****  ".to_string()),
        ]));
        let orch = orchestrator(model);

        let first = orch.analyze(&full_request()).await.unwrap();
        assert!(first.is_degraded());
        assert_eq!(first.recommendation, Recommendation::Unknown);

        let second = orch.analyze(&full_request()).await.unwrap();
        assert!(second.is_degraded());
        assert_eq!(second.confidence, None);
    }

    #[tokio::test]
    async fn test_each_analyze_makes_a_fresh_call() {
        let model = Arc::new(FakeLanguageModel::with_responses([
            PROCEED_RESPONSE,
            "FINAL RECOMMENDATION: DECLINE",
        ]));
        let orch = orchestrator(Arc::clone(&model));
        let req = full_request();
        let first = orch.analyze(&req).await.unwrap();
        let second = orch.analyze(&req).await.unwrap();
        assert_eq!(first.recommendation, Recommendation::Proceed);
        assert_eq!(second.recommendation, Recommendation::Decline);
        assert_eq!(model.calls(), 2);
    }
}
