//! Marker vocabulary and highlight-span computation.
//!
//! Spans are byte offsets into the report's `raw_text`, sorted by start. Rendering is the
//! presentation layer's job.

use serde::{Deserialize, Serialize};

use crate::report::Recommendation;

/// Outcome markers the analysis prompt asks the model to use, upper-case as requested.
pub const OUTCOME_MARKERS: [(&str, Recommendation, SpanCategory); 3] = [
    (
        "PROCEED TO INTERVIEW",
        Recommendation::Proceed,
        SpanCategory::Proceed,
    ),
    (
        "ADDITIONAL SCREENING",
        Recommendation::AdditionalScreening,
        SpanCategory::AdditionalScreening,
    ),
    ("DECLINE", Recommendation::Decline, SpanCategory::Decline),
];

pub const KEY_INSIGHTS_HEADER: &str = "Key Insights";

/// Section headings of the analysis layout, other than Key Insights.
pub const SECTION_HEADERS: [&str; 5] = [
    "Resume vs. Conversation",
    "Job Fit Analysis",
    "FINAL RECOMMENDATION",
    "Confidence Level",
    "Justification",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanCategory {
    Proceed,
    Decline,
    AdditionalScreening,
    KeyInsightsHeader,
    SectionHeader,
    Confidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
    pub category: SpanCategory,
}

impl HighlightSpan {
    /// The highlighted slice of `text`, if the offsets are valid for it.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

/// Byte offsets of whole-word occurrences of `needle` in `haystack`.
///
/// Case-insensitive matching folds ASCII only, so offsets in the folded string are valid in
/// `haystack`.
pub fn find_word(haystack: &str, needle: &str, case_insensitive: bool) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    let (hay, pat) = if case_insensitive {
        (haystack.to_ascii_lowercase(), needle.to_ascii_lowercase())
    } else {
        (haystack.to_string(), needle.to_string())
    };

    hay.match_indices(pat.as_str())
        .map(|(start, _)| start)
        .filter(|&start| is_word_boundary(haystack, start, start + needle.len()))
        .collect()
}

fn is_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

/// Every marker and section-header occurrence in `raw_text`, plus `extra` spans
/// (e.g. the confidence value), sorted by position.
pub fn compute_spans(raw_text: &str, extra: impl IntoIterator<Item = HighlightSpan>) -> Vec<HighlightSpan> {
    let mut spans = Vec::new();

    for (marker, _, category) in OUTCOME_MARKERS {
        spans.extend(find_word(raw_text, marker, false).into_iter().map(|start| HighlightSpan {
            start,
            end: start + marker.len(),
            category,
        }));
    }

    spans.extend(
        find_word(raw_text, KEY_INSIGHTS_HEADER, true)
            .into_iter()
            .map(|start| HighlightSpan {
                start,
                end: start + KEY_INSIGHTS_HEADER.len(),
                category: SpanCategory::KeyInsightsHeader,
            }),
    );

    for header in SECTION_HEADERS {
        spans.extend(find_word(raw_text, header, true).into_iter().map(|start| HighlightSpan {
            start,
            end: start + header.len(),
            category: SpanCategory::SectionHeader,
        }));
    }

    spans.extend(extra);
    spans.sort_by_key(|s| (s.start, s.end));
    spans.dedup();
    spans
}
