//! Session — one candidate evaluation: its documents, transcript, similarity and reports.
//!
//! A session owns everything it produces; nothing is shared across sessions. Document
//! loading and scoring run without holding any lock across an await, so they proceed
//! concurrently with an in-flight analysis.

pub mod handlers;

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::{AnalysisOrchestrator, AnalysisRequest};
use crate::config::Config;
use crate::document::{Document, DocumentLoader, DocumentRole, SourceFormat, DEFAULT_MAX_FILE_SIZE};
use crate::errors::{PipelineError, PreconditionReason};
use crate::interview::InterviewAssistant;
use crate::llm_client::prompts::PromptBudget;
use crate::llm_client::LanguageModel;
use crate::report::{to_export_text, AnalysisReport, ExportMetadata};
use crate::similarity::{Embedder, SimilarityResult, SimilarityScorer};
use crate::transcript::{ChatMessage, Sender, TranscriptSnapshot, TranscriptStore};

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub llm_timeout: Duration,
    pub prompt_budget: PromptBudget,
    pub max_file_size_bytes: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            llm_timeout: Duration::from_secs(30),
            prompt_budget: PromptBudget::default(),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            llm_timeout: config.llm.timeout,
            prompt_budget: PromptBudget {
                max_document_chars: config.prompt_max_document_chars,
                max_transcript_chars: config.prompt_max_transcript_chars,
            },
            max_file_size_bytes: config.max_file_size_bytes,
        }
    }
}

/// A report as kept in session history.
#[derive(Debug, Clone, Serialize)]
pub struct StoredReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub messages_analyzed: usize,
    /// Similarity score of the documents the analysis used, if one had been computed.
    pub match_score: Option<f32>,
    pub report: Arc<AnalysisReport>,
}

#[derive(Debug, Default)]
struct Documents {
    job_description: Option<Arc<Document>>,
    resume: Option<Arc<Document>>,
    similarity: Option<SimilarityResult>,
}

impl Documents {
    fn get(&self, role: DocumentRole) -> Option<Arc<Document>> {
        match role {
            DocumentRole::JobDescription => self.job_description.clone(),
            DocumentRole::Resume => self.resume.clone(),
        }
    }

    /// Current similarity, only if it was computed from the current documents.
    fn current_similarity(&self) -> Option<&SimilarityResult> {
        let (resume, jd) = (self.resume.as_ref()?, self.job_description.as_ref()?);
        self.similarity.as_ref().filter(|s| s.is_for(resume, jd))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub candidate: Option<String>,
    pub created_at: DateTime<Utc>,
    pub job_description_loaded: bool,
    pub resume_loaded: bool,
    pub similarity: Option<SimilarityResult>,
    pub messages: usize,
    pub reports: usize,
    pub analysis_in_progress: bool,
}

pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    candidate: RwLock<Option<String>>,
    loader: DocumentLoader,
    scorer: SimilarityScorer,
    orchestrator: AnalysisOrchestrator,
    interviewer: InterviewAssistant,
    transcript: TranscriptStore,
    documents: RwLock<Documents>,
    reports: RwLock<Vec<StoredReport>>,
}

impl Session {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        settings: &SessionSettings,
    ) -> Self {
        let id = Uuid::new_v4();
        info!("Session {id} created");
        Self {
            id,
            created_at: Utc::now(),
            candidate: RwLock::new(None),
            loader: DocumentLoader::new(settings.max_file_size_bytes),
            scorer: SimilarityScorer::new(embedder),
            orchestrator: AnalysisOrchestrator::new(
                Arc::clone(&llm),
                settings.llm_timeout,
                settings.prompt_budget,
            ),
            interviewer: InterviewAssistant::new(llm, settings.llm_timeout, settings.prompt_budget),
            transcript: TranscriptStore::new(),
            documents: RwLock::new(Documents::default()),
            reports: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn candidate(&self) -> Option<String> {
        self.candidate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sets the candidate name shown in exports. Blank clears it; names with line breaks or
    /// other control characters are rejected.
    pub fn set_candidate(&self, name: Option<String>) -> Result<(), PipelineError> {
        let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if name.as_deref().is_some_and(|n| n.chars().any(char::is_control)) {
            return Err(PipelineError::Validation(
                "Candidate name must be a single line without control characters".to_string(),
            ));
        }
        *self.candidate.write().unwrap_or_else(PoisonError::into_inner) = name;
        Ok(())
    }

    pub fn summary(&self) -> SessionSummary {
        let docs = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        SessionSummary {
            id: self.id,
            candidate: self.candidate(),
            created_at: self.created_at,
            job_description_loaded: docs.job_description.is_some(),
            resume_loaded: docs.resume.is_some(),
            similarity: docs.current_similarity().cloned(),
            messages: self.transcript.len(),
            reports: self.reports.read().unwrap_or_else(PoisonError::into_inner).len(),
            analysis_in_progress: self.orchestrator.is_busy(),
        }
    }

    // ── Documents ───────────────────────────────────────────────────────────

    /// Loads a document from disk and installs it in `role`, replacing any previous one.
    pub async fn load_document(
        &self,
        role: DocumentRole,
        path: &Path,
        format: Option<SourceFormat>,
    ) -> Result<Arc<Document>, PipelineError> {
        let doc = Arc::new(self.loader.load(path, format).await?);
        self.install(role, Arc::clone(&doc));
        Ok(doc)
    }

    /// Loads an uploaded document and installs it in `role`.
    pub async fn load_document_bytes(
        &self,
        role: DocumentRole,
        name: &str,
        bytes: Bytes,
        format: Option<SourceFormat>,
    ) -> Result<Arc<Document>, PipelineError> {
        let doc = Arc::new(self.loader.load_bytes(name, bytes, format).await?);
        self.install(role, Arc::clone(&doc));
        Ok(doc)
    }

    fn install(&self, role: DocumentRole, doc: Arc<Document>) {
        let mut docs = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        match role {
            DocumentRole::JobDescription => docs.job_description = Some(doc),
            DocumentRole::Resume => docs.resume = Some(doc),
        }
        docs.similarity = None;
        info!("Session {}: {:?} document replaced", self.id, role);
    }

    pub fn document(&self, role: DocumentRole) -> Option<Arc<Document>> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(role)
    }

    fn both_documents(&self) -> Result<(Arc<Document>, Arc<Document>), PipelineError> {
        let docs = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        match (docs.job_description.clone(), docs.resume.clone()) {
            (Some(jd), Some(resume)) => Ok((jd, resume)),
            _ => Err(PipelineError::precondition(PreconditionReason::MissingDocument)),
        }
    }

    // ── Similarity ──────────────────────────────────────────────────────────

    /// Recomputes the resume/JD score. The result is kept only if neither document changed
    /// while it was being computed.
    pub async fn refresh_similarity(&self) -> Result<SimilarityResult, PipelineError> {
        let (jd, resume) = self.both_documents()?;
        let result = self.scorer.score(resume, jd).await?;

        let mut docs = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        let current = match (&docs.resume, &docs.job_description) {
            (Some(r), Some(j)) => result.is_for(r, j),
            _ => false,
        };
        if current {
            docs.similarity = Some(result.clone());
        } else {
            warn!("Session {}: documents changed during scoring, result not stored", self.id);
        }
        Ok(result)
    }

    /// The stored score for the current documents, if any.
    pub fn similarity(&self) -> Option<SimilarityResult> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current_similarity()
            .cloned()
    }

    // ── Transcript ──────────────────────────────────────────────────────────

    pub fn append_message(
        &self,
        sender: Sender,
        text: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<ChatMessage, PipelineError> {
        self.transcript.append(sender, text, timestamp)
    }

    pub fn transcript_snapshot(&self) -> TranscriptSnapshot {
        self.transcript.snapshot()
    }

    pub fn clear_transcript(&self) {
        self.transcript.clear();
        info!("Session {}: transcript cleared", self.id);
    }

    // ── Analysis and reports ────────────────────────────────────────────────

    /// Analyzes the current documents against a snapshot of the transcript taken now.
    pub async fn analyze(&self) -> Result<StoredReport, PipelineError> {
        let (job_description, resume) = self.both_documents()?;
        let request = AnalysisRequest {
            job_description,
            resume,
            transcript: self.transcript.snapshot(),
        };

        let report = self.orchestrator.analyze(&request).await?;

        let match_score = {
            let docs = self.documents.read().unwrap_or_else(PoisonError::into_inner);
            docs.similarity
                .as_ref()
                .filter(|s| s.is_for(&request.resume, &request.job_description))
                .map(|s| s.score)
        };

        let stored = StoredReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            messages_analyzed: request.transcript.len(),
            match_score,
            report: Arc::new(report),
        };
        self.reports
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stored.clone());
        Ok(stored)
    }

    pub fn reports(&self) -> Vec<StoredReport> {
        self.reports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn report(&self, id: Uuid) -> Result<StoredReport, PipelineError> {
        self.reports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("Report {id} not found")))
    }

    /// Flat-text export of a stored report.
    pub fn export(&self, id: Uuid) -> Result<String, PipelineError> {
        let stored = self.report(id)?;
        let meta = ExportMetadata {
            session_id: self.id,
            report_id: stored.id,
            candidate: self.candidate(),
            generated_at: stored.created_at,
            messages_analyzed: stored.messages_analyzed,
            match_score: stored.match_score,
        };
        Ok(to_export_text(&stored.report, &meta))
    }

    // ── Interview assistance ────────────────────────────────────────────────

    pub async fn suggest_follow_up(&self) -> Result<String, PipelineError> {
        let jd = self
            .document(DocumentRole::JobDescription)
            .ok_or_else(|| PipelineError::precondition(PreconditionReason::MissingDocument))?;
        self.interviewer
            .suggest_follow_up(&jd, &self.transcript.snapshot())
            .await
    }

    pub async fn interview_questions(&self) -> Result<Vec<String>, PipelineError> {
        let (jd, resume) = self.both_documents()?;
        self.interviewer.generate_questions(&jd, &resume).await
    }
}
