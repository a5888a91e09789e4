//! Report Synthesizer — parses raw analysis text into a typed `AnalysisReport`.
//!
//! Parsing is a best-effort heuristic over free-form model output. `raw_text` stays the
//! source of truth; absent markers yield `Unknown` and absent confidence yields `None`.
//! `synthesize` is pure: the same text always yields the same report.

pub mod export;
pub mod highlight;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use export::{to_export_text, ExportMetadata};
pub use highlight::{HighlightSpan, SpanCategory};

use highlight::{find_word, KEY_INSIGHTS_HEADER, OUTCOME_MARKERS, SECTION_HEADERS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Proceed,
    Decline,
    AdditionalScreening,
    Unknown,
}

impl Recommendation {
    /// The marker phrase as it appears in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::Proceed => "PROCEED TO INTERVIEW",
            Recommendation::Decline => "DECLINE",
            Recommendation::AdditionalScreening => "ADDITIONAL SCREENING",
            Recommendation::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    const ALL: [(ConfidenceLevel, &'static str); 3] = [
        (ConfidenceLevel::High, "High"),
        (ConfidenceLevel::Medium, "Medium"),
        (ConfidenceLevel::Low, "Low"),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::Low => "Low",
        }
    }
}

/// Confidence as stated by the model: a fraction in [0, 1] or a categorical level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Confidence {
    Numeric(f32),
    Categorical(ConfidenceLevel),
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Numeric(v) => write!(f, "{:.0}%", v * 100.0),
            Confidence::Categorical(level) => f.write_str(level.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub recommendation: Recommendation,
    pub confidence: Option<Confidence>,
    pub key_insights: Vec<String>,
    pub raw_text: String,
    pub highlighted_spans: Vec<HighlightSpan>,
    /// Set when the model output could not be minimally parsed.
    pub degraded_reason: Option<String>,
}

impl AnalysisReport {
    /// A report for a response that could not be used, keeping whatever text there was.
    pub fn degraded(raw_text: impl Into<String>, reason: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        Self {
            recommendation: Recommendation::Unknown,
            confidence: None,
            key_insights: Vec::new(),
            highlighted_spans: highlight::compute_spans(&raw_text, []),
            raw_text,
            degraded_reason: Some(reason.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded_reason.is_some()
    }
}

/// Parses raw analysis text into a report.
pub fn synthesize(raw_text: &str) -> AnalysisReport {
    if raw_text.trim().is_empty() {
        return AnalysisReport::degraded(raw_text, "model returned no analysis text");
    }

    let (recommendation, recommendation_span) = extract_recommendation(raw_text);
    let confidence = extract_confidence(raw_text);
    let key_insights = extract_key_insights(raw_text);

    let confidence_span = confidence.map(|(_, span)| span);
    let highlighted_spans =
        highlight::compute_spans(raw_text, recommendation_span.into_iter().chain(confidence_span));

    AnalysisReport {
        recommendation,
        confidence: confidence.map(|(c, _)| c),
        key_insights,
        raw_text: raw_text.to_string(),
        highlighted_spans,
        degraded_reason: None,
    }
}

// ── Line helpers ─────────────────────────────────────────────────────────────

/// Strips list numbering ("3.", "3)") and markdown heading hashes.
fn strip_list_prefix(line: &str) -> &str {
    let line = line.trim_start().trim_start_matches('#').trim_start();
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let line = if digits > 0 {
        match line[digits..].strip_prefix(&['.', ')'][..]) {
            Some(rest) => rest,
            None => line,
        }
    } else {
        line
    };
    line.trim_start()
}

fn bullet_content(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    for glyph in ["- ", "* ", "• ", "– ", "· "] {
        if let Some(rest) = trimmed.strip_prefix(glyph) {
            return Some(rest.trim());
        }
    }
    let stripped = strip_list_prefix(trimmed);
    let has_number = trimmed.starts_with(|c: char| c.is_ascii_digit());
    if has_number && stripped.len() < trimmed.len() {
        return Some(stripped.trim());
    }
    None
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn is_section_header(line: &str) -> bool {
    let body = strip_list_prefix(line);
    starts_with_ignore_case(body, KEY_INSIGHTS_HEADER)
        || SECTION_HEADERS
            .iter()
            .any(|h| starts_with_ignore_case(body, h))
        || starts_with_ignore_case(body, "Confidence")
}

/// Text after a label on its line: past the first colon if there is one, with separators
/// and stray emphasis removed.
fn after_label(body: &str, label_len: usize) -> &str {
    let rest = &body[label_len..];
    let rest = match rest.find(':') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_start_matches(|c: char| c == ':' || c == '*' || c == '-' || c.is_whitespace())
        .trim_end_matches(|c: char| c == '*' || c.is_whitespace())
}

/// Byte offset of `inner` within `outer`. `inner` must be a subslice of `outer`.
fn offset_in(outer: &str, inner: &str) -> usize {
    inner.as_ptr() as usize - outer.as_ptr() as usize
}

/// Finds the first line whose body starts with `label` and returns the value region that
/// follows it (rest of the line, else the next non-empty line) with its byte offset.
fn labelled_region<'a>(text: &'a str, label: &str) -> Option<(usize, &'a str)> {
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let body = strip_list_prefix(line);
        if !starts_with_ignore_case(body, label) {
            continue;
        }
        let rest = after_label(body, label.len());
        let region = if rest.is_empty() {
            lines.by_ref().map(str::trim).find(|l| !l.is_empty())?
        } else {
            rest
        };
        return Some((offset_in(text, region), region));
    }
    None
}

// ── Recommendation ───────────────────────────────────────────────────────────

/// Resolution order:
/// 1. markers (any case) on the FINAL RECOMMENDATION line or the line after it;
/// 2. upper-case markers anywhere in the text.
///
/// Exactly one distinct marker wins; none or several conflicting markers give `Unknown`.
/// A marker taken from the labelled region comes back with its span, since the upper-case
/// scan in `compute_spans` misses mixed-case occurrences.
fn extract_recommendation(text: &str) -> (Recommendation, Option<HighlightSpan>) {
    if let Some((region_start, region)) = labelled_region(text, "FINAL RECOMMENDATION") {
        if let Some((rec, span)) = single_marker(region, true) {
            let span = HighlightSpan {
                start: region_start + span.start,
                end: region_start + span.end,
                category: span.category,
            };
            return (rec, Some(span));
        }
    }
    match single_marker(text, false) {
        Some((rec, _)) => (rec, None),
        None => (Recommendation::Unknown, None),
    }
}

/// The only distinct marker in `text`, with the span of its first occurrence.
fn single_marker(text: &str, case_insensitive: bool) -> Option<(Recommendation, HighlightSpan)> {
    let mut found = OUTCOME_MARKERS.iter().filter_map(|(marker, rec, category)| {
        find_word(text, marker, case_insensitive)
            .first()
            .map(|&start| {
                let span = HighlightSpan {
                    start,
                    end: start + marker.len(),
                    category: *category,
                };
                (*rec, span)
            })
    });
    match (found.next(), found.next()) {
        (Some(hit), None) => Some(hit),
        _ => None,
    }
}

// ── Confidence ───────────────────────────────────────────────────────────────

fn extract_confidence(text: &str) -> Option<(Confidence, HighlightSpan)> {
    let (region_start, region) = labelled_region(text, "Confidence")?;

    let levels: Vec<(ConfidenceLevel, usize, usize)> = ConfidenceLevel::ALL
        .iter()
        .filter_map(|(level, word)| {
            find_word(region, word, true)
                .first()
                .map(|&start| (*level, start, word.len()))
        })
        .collect();

    if let [(level, start, len)] = levels.as_slice() {
        let span = HighlightSpan {
            start: region_start + start,
            end: region_start + start + len,
            category: SpanCategory::Confidence,
        };
        return Some((Confidence::Categorical(*level), span));
    }
    if levels.len() > 1 {
        return None;
    }

    let (value, start, len) = parse_numeric_confidence(region)?;
    let span = HighlightSpan {
        start: region_start + start,
        end: region_start + start + len,
        category: SpanCategory::Confidence,
    };
    Some((Confidence::Numeric(value), span))
}

/// Reads the first number in `region` as a confidence fraction.
///
/// `85%` → 0.85, `8/10` → 0.8, `0.7` → 0.7, bare values in (1, 100] are read as percent.
/// Returns the value with the byte range of the matched token.
fn parse_numeric_confidence(region: &str) -> Option<(f32, usize, usize)> {
    let start = region.find(|c: char| c.is_ascii_digit())?;
    let rest = &region[start..];
    let num_len = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let number: f32 = rest[..num_len].trim_end_matches('.').parse().ok()?;
    let after = &rest[num_len..];

    let (value, token_len) = if after.starts_with('%') {
        (number / 100.0, num_len + 1)
    } else if let Some(denominator) = after.strip_prefix('/') {
        let den_len = denominator
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(denominator.len());
        let den: f32 = denominator[..den_len].parse().ok()?;
        if den == 0.0 {
            return None;
        }
        (number / den, num_len + 1 + den_len)
    } else if number <= 1.0 {
        (number, num_len)
    } else if number <= 100.0 {
        (number / 100.0, num_len)
    } else {
        return None;
    };

    if !(0.0..=1.0).contains(&value) {
        return None;
    }
    Some((value, start, token_len))
}

// ── Key insights ─────────────────────────────────────────────────────────────

/// Bullet or numbered items under the Key Insights header, in source order, up to the next
/// section header. Wrapped lines continue the previous item. Without bullets, each non-empty
/// line (including text after the header's colon) is an item.
fn extract_key_insights(text: &str) -> Vec<String> {
    let mut lines = text.lines();
    let inline = loop {
        match lines.next() {
            Some(line) => {
                let body = strip_list_prefix(line);
                if starts_with_ignore_case(body, KEY_INSIGHTS_HEADER) {
                    break after_colon(body);
                }
            }
            None => return Vec::new(),
        }
    };

    let mut items: Vec<String> = Vec::new();
    let mut loose: Vec<String> = Vec::new();
    if !inline.is_empty() {
        loose.push(inline.to_string());
    }

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(content) = bullet_content(line) {
            if is_section_header(line) {
                break;
            }
            if !content.is_empty() {
                items.push(content.to_string());
            }
            continue;
        }
        if is_section_header(line) || is_outcome_line(line) {
            break;
        }
        match items.last_mut() {
            Some(last) => {
                last.push(' ');
                last.push_str(line.trim());
            }
            None => loose.push(line.trim().to_string()),
        }
    }

    if items.is_empty() {
        loose
    } else {
        items
    }
}

fn after_colon(body: &str) -> &str {
    match body.find(':') {
        Some(idx) => body[idx + 1..].trim(),
        None => "",
    }
}

/// A line that is nothing but an outcome marker ends the insights block.
fn is_outcome_line(line: &str) -> bool {
    let trimmed = line.trim();
    OUTCOME_MARKERS.iter().any(|(marker, _, _)| trimmed == *marker)
}
