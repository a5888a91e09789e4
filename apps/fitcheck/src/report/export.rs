//! Flat-text export: a metadata block, one blank line, then the raw analysis text.
//! Writing the result anywhere is the caller's job.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::report::AnalysisReport;

#[derive(Debug, Clone, Serialize)]
pub struct ExportMetadata {
    pub session_id: Uuid,
    pub report_id: Uuid,
    pub candidate: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub messages_analyzed: usize,
    pub match_score: Option<f32>,
}

/// Collapses a metadata value onto one line so it cannot end the header block early.
fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn to_export_text(report: &AnalysisReport, meta: &ExportMetadata) -> String {
    let mut header = vec![
        "CANDIDATE EVALUATION REPORT".to_string(),
        format!("Session: {}", meta.session_id),
        format!("Report: {}", meta.report_id),
    ];
    if let Some(candidate) = meta.candidate.as_deref().map(single_line) {
        if !candidate.is_empty() {
            header.push(format!("Candidate: {candidate}"));
        }
    }
    header.push(format!(
        "Date: {}",
        meta.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    header.push(format!("Messages analyzed: {}", meta.messages_analyzed));
    header.push(match meta.match_score {
        Some(score) => format!("Initial resume match score: {score:.1}/10"),
        None => "Initial resume match score: not computed".to_string(),
    });
    header.push(format!("Recommendation: {}", report.recommendation));
    header.push(match &report.confidence {
        Some(confidence) => format!("Confidence: {confidence}"),
        None => "Confidence: not stated".to_string(),
    });
    if let Some(reason) = &report.degraded_reason {
        header.push(format!("Degraded: {}", single_line(reason)));
    }

    let mut out = header.join("\n");
    out.push_str("\n\n");
    out.push_str(&report.raw_text);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}
