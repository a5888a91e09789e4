// Prompt constants for the Analysis Orchestrator.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{
    bounded_recent_section, bounded_section, fill_template, PromptBudget,
};
use crate::transcript::TranscriptSnapshot;

/// Analysis prompt. Sections always appear in this order: job description, resume, transcript.
/// Replace: {jd_text}, {resume_text}, {transcript}
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze this candidate for the role using the three inputs below.

JOB DESCRIPTION:
{jd_text}

CANDIDATE RESUME:
{resume_text}

CONVERSATION TRANSCRIPT:
{transcript}

Provide your analysis in exactly this structure:

1. Key Insights from Conversation:
- Technical skills demonstrated
- Communication skills
- Cultural fit indicators
- Red flags, if any

2. Resume vs. Conversation Consistency:
Note any claims on the resume that the conversation confirms or contradicts.

3. Job Fit Analysis:
How well the candidate matches the requirements of the job description.

4. FINAL RECOMMENDATION: write exactly one of PROCEED TO INTERVIEW, DECLINE, ADDITIONAL SCREENING

5. Confidence Level: write exactly one of High, Medium, Low

6. Justification:
A short paragraph explaining the recommendation."#;

/// Builds the analysis prompt. Identical inputs always yield an identical prompt.
///
/// Documents keep their head; the transcript keeps its most recent turns.
pub fn build_analysis_prompt(
    jd_text: &str,
    resume_text: &str,
    transcript: &TranscriptSnapshot,
    budget: PromptBudget,
) -> String {
    let jd = bounded_section(jd_text, budget.max_document_chars);
    let resume = bounded_section(resume_text, budget.max_document_chars);
    let transcript = bounded_recent_section(&transcript.render(), budget.max_transcript_chars);

    fill_template(
        ANALYSIS_PROMPT_TEMPLATE,
        &[
            ("jd_text", &jd),
            ("resume_text", &resume),
            ("transcript", &transcript),
        ],
    )
}
