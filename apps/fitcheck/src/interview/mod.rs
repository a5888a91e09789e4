//! Interview Assistant — follow-up suggestions and prepared questions for the recruiter.
//!
//! Both operations make one bounded model call and never touch the analysis in-flight flag.

pub mod prompts;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::document::Document;
use crate::errors::{ModelServiceErrorKind, PipelineError, PreconditionReason};
use crate::llm_client::prompts::{
    bounded_recent_section, bounded_section, fill_template, PromptBudget,
    RECRUITER_ASSISTANT_SYSTEM,
};
use crate::llm_client::{complete_with_timeout, strip_markdown_emphasis, LanguageModel};
use crate::transcript::TranscriptSnapshot;

use prompts::{FOLLOW_UP_PROMPT_TEMPLATE, QUESTIONS_PROMPT_TEMPLATE};

/// Messages needed before a follow-up can be suggested.
pub const MIN_MESSAGES_FOR_FOLLOW_UP: usize = 2;
/// How many of the latest messages the follow-up prompt sees.
pub const FOLLOW_UP_CONTEXT_MESSAGES: usize = 3;

pub struct InterviewAssistant {
    llm: Arc<dyn LanguageModel>,
    timeout: Duration,
    budget: PromptBudget,
}

impl InterviewAssistant {
    pub fn new(llm: Arc<dyn LanguageModel>, timeout: Duration, budget: PromptBudget) -> Self {
        Self {
            llm,
            timeout,
            budget,
        }
    }

    /// Suggests the next question from the job description and the latest messages.
    pub async fn suggest_follow_up(
        &self,
        job_description: &Document,
        transcript: &TranscriptSnapshot,
    ) -> Result<String, PipelineError> {
        if transcript.len() < MIN_MESSAGES_FOR_FOLLOW_UP {
            return Err(PipelineError::precondition(
                PreconditionReason::InsufficientConversation,
            ));
        }

        let jd = bounded_section(job_description.text(), self.budget.max_document_chars);
        let recent = bounded_recent_section(
            &transcript.tail(FOLLOW_UP_CONTEXT_MESSAGES).render(),
            self.budget.max_transcript_chars,
        );
        let prompt = fill_template(
            FOLLOW_UP_PROMPT_TEMPLATE,
            &[("jd_text", &jd), ("recent_messages", &recent)],
        );

        let raw =
            complete_with_timeout(self.llm.as_ref(), &prompt, RECRUITER_ASSISTANT_SYSTEM, self.timeout)
                .await?;
        let suggestion = strip_markdown_emphasis(&raw);
        if suggestion.is_empty() {
            return Err(malformed("follow-up suggestion was empty"));
        }
        debug!("Follow-up suggestion: {suggestion}");
        Ok(suggestion)
    }

    /// Generates a numbered list of interview questions and returns them in order.
    pub async fn generate_questions(
        &self,
        job_description: &Document,
        resume: &Document,
    ) -> Result<Vec<String>, PipelineError> {
        let jd = bounded_section(job_description.text(), self.budget.max_document_chars);
        let resume = bounded_section(resume.text(), self.budget.max_document_chars);
        let prompt = fill_template(
            QUESTIONS_PROMPT_TEMPLATE,
            &[("jd_text", &jd), ("resume_text", &resume)],
        );

        let raw =
            complete_with_timeout(self.llm.as_ref(), &prompt, RECRUITER_ASSISTANT_SYSTEM, self.timeout)
                .await?;
        let questions = parse_question_list(&strip_markdown_emphasis(&raw));
        if questions.is_empty() {
            return Err(malformed("no questions found in model response"));
        }
        debug!("Generated {} interview questions", questions.len());
        Ok(questions)
    }
}

fn malformed(message: &str) -> PipelineError {
    PipelineError::ModelService {
        kind: ModelServiceErrorKind::MalformedResponse,
        retryable: false,
        message: message.to_string(),
    }
}

/// Numbered items ("1. ...", "2) ...") in order. Without numbering, lines ending in '?'.
fn parse_question_list(text: &str) -> Vec<String> {
    let numbered: Vec<String> = text
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            if digits == 0 {
                return None;
            }
            line[digits..]
                .strip_prefix(&['.', ')'][..])
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string)
        })
        .collect();

    if !numbered.is_empty() {
        return numbered;
    }

    text.lines()
        .map(|l| l.trim().trim_start_matches(&['-', '*', '•'][..]).trim())
        .filter(|l| l.ends_with('?'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeLanguageModel;
    use crate::transcript::{Sender, TranscriptStore};

    fn jd() -> Document {
        Document::from_text("jd.txt", "Data analyst with SQL and dashboards").unwrap()
    }

    fn assistant(model: Arc<FakeLanguageModel>) -> InterviewAssistant {
        InterviewAssistant::new(model, Duration::from_secs(30), PromptBudget::default())
    }

    #[test]
    fn test_parse_numbered_questions() {
        let text = "Here you go:\n1. How do you model churn?\n2) Which SQL window functions do you use?\n\n3.   \n";
        assert_eq!(
            parse_question_list(text),
            vec![
                "How do you model churn?",
                "Which SQL window functions do you use?"
            ]
        );
    }

    #[test]
    fn test_parse_unnumbered_questions_fallback() {
        let text = "- What is a CTE?\n- Explain indexes?\nThanks";
        assert_eq!(
            parse_question_list(text),
            vec!["What is a CTE?", "Explain indexes?"]
        );
    }

    #[tokio::test]
    async fn test_follow_up_needs_two_messages() {
        let model = Arc::new(FakeLanguageModel::with_responses(["unused"]));
        let store = TranscriptStore::new();
        store.append(Sender::Recruiter, "Hi", None).unwrap();

        let err = assistant(Arc::clone(&model))
            .suggest_follow_up(&jd(), &store.snapshot())
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some("insufficient_conversation"));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_follow_up_uses_last_three_messages() {
        let model = Arc::new(FakeLanguageModel::with_responses([
            "**How would you validate a dashboard metric?**",
        ]));
        let store = TranscriptStore::new();
        for (sender, text) in [
            (Sender::Recruiter, "oldest question"),
            (Sender::Candidate, "answer one"),
            (Sender::Recruiter, "second question"),
            (Sender::Candidate, "answer two"),
        ] {
            store.append(sender, text, None).unwrap();
        }

        let suggestion = assistant(Arc::clone(&model))
            .suggest_follow_up(&jd(), &store.snapshot())
            .await
            .unwrap();
        assert_eq!(suggestion, "How would you validate a dashboard metric?");

        let prompt = &model.prompts()[0];
        assert!(!prompt.contains("oldest question"));
        assert!(prompt.contains("Candidate: answer two"));
        assert!(prompt.contains("Data analyst with SQL"));
    }

    #[tokio::test]
    async fn test_generate_questions_rejects_unparseable_output() {
        let model = Arc::new(FakeLanguageModel::with_responses(["I cannot help with that."]));
        let resume = Document::from_text("cv.txt", "Analyst, 3 years").unwrap();
        let err = assistant(model)
            .generate_questions(&jd(), &resume)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some("malformed_response"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_generate_questions_returns_list() {
        let model = Arc::new(FakeLanguageModel::with_responses([
            "1. **Describe** a dashboard you built.\n2. How do you handle missing data?",
        ]));
        let resume = Document::from_text("cv.txt", "Analyst, 3 years").unwrap();
        let questions = assistant(model)
            .generate_questions(&jd(), &resume)
            .await
            .unwrap();
        assert_eq!(
            questions,
            vec![
                "Describe a dashboard you built.",
                "How do you handle missing data?"
            ]
        );
    }
}
