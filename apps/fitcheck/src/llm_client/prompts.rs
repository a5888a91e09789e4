// Shared prompt constants and prompt-building utilities.
// Each component that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt shared by every recruiting-assistant call.
pub const RECRUITER_ASSISTANT_SYSTEM: &str = "You are an experienced technical recruiter \
    assisting a hiring team. Base every statement on the job description, resume and \
    conversation you are given. Do NOT invent facts about the candidate. \
    Write plain text; do not use markdown tables.";

/// Marker appended when a document is cut to fit the prompt budget.
pub const TRUNCATION_MARKER: &str = "[... truncated ...]";

/// Marker placed before a transcript whose earliest turns were dropped.
pub const EARLIER_OMITTED_MARKER: &str = "[... earlier conversation omitted ...]";

/// Character budgets for the variable parts of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBudget {
    /// Per document (job description, resume).
    pub max_document_chars: usize,
    /// For the rendered conversation as a whole.
    pub max_transcript_chars: usize,
}

impl Default for PromptBudget {
    fn default() -> Self {
        Self {
            max_document_chars: 12_000,
            max_transcript_chars: 16_000,
        }
    }
}

/// Returns the longest prefix of `text` holding at most `max_chars` characters,
/// and whether anything was cut.
///
/// Resumes and job descriptions front-load their most salient content, so the head is kept.
pub fn truncate_head(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

/// Truncates `text` for inclusion in a prompt, appending `TRUNCATION_MARKER` when cut.
pub fn bounded_section(text: &str, max_chars: usize) -> String {
    let (head, truncated) = truncate_head(text, max_chars);
    if truncated {
        format!("{}\n{TRUNCATION_MARKER}", head.trim_end())
    } else {
        head.to_string()
    }
}

/// Returns the longest suffix of `text` holding at most `max_chars` characters,
/// and whether anything was cut.
pub fn truncate_tail(text: &str, max_chars: usize) -> (&str, bool) {
    let total = text.chars().count();
    if total <= max_chars {
        return (text, false);
    }
    match text.char_indices().nth(total - max_chars) {
        Some((byte_idx, _)) => (&text[byte_idx..], true),
        None => ("", true),
    }
}

/// Keeps the end of a line-oriented log within `max_chars`, preceded by
/// `EARLIER_OMITTED_MARKER` when cut. A partial leading line is dropped whenever a whole
/// line remains after it.
pub fn bounded_recent_section(text: &str, max_chars: usize) -> String {
    let (tail, truncated) = truncate_tail(text, max_chars);
    if !truncated {
        return tail.to_string();
    }
    let starts_on_line = text[..text.len() - tail.len()].ends_with('\n');
    let tail = match tail.find('\n') {
        Some(idx) if !starts_on_line && idx + 1 < tail.len() => &tail[idx + 1..],
        _ => tail,
    };
    format!("{EARLIER_OMITTED_MARKER}\n{}", tail.trim_start())
}

/// Substitutes `{key}` placeholders in one pass, so values containing brace text are never
/// expanded again. Unknown placeholders are left as written.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(
        template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>(),
    );
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let candidate = &rest[open + 1..];
        let value = candidate.find('}').and_then(|close| {
            let key = &candidate[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &candidate[close + 1..];
            }
            None => {
                out.push('{');
                rest = candidate;
            }
        }
    }
    out.push_str(rest);
    out
}
