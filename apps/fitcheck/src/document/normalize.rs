//! Text normalization shared by every document format.
//!
//! Output invariants:
//! - no control characters other than `\n`
//! - no leading/trailing whitespace on any line, no runs of spaces inside a line
//! - paragraphs separated by exactly one blank line
//!
//! These make `normalize_text` a fixed point: normalizing its own output changes nothing.

/// Collapses whitespace, strips control characters and keeps paragraph boundaries.
pub fn normalize_text(input: &str) -> String {
    let mut cleaned = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    cleaned.push('\n');
                }
            }
            '\n' => cleaned.push('\n'),
            // Form feed separates PDF pages.
            '\u{000C}' => cleaned.push_str("\n\n"),
            '\u{2028}' => cleaned.push('\n'),
            '\u{2029}' => cleaned.push_str("\n\n"),
            '\t' | '\u{000B}' => cleaned.push(' '),
            c if c.is_control() => {}
            c if c.is_whitespace() => cleaned.push(' '),
            c => cleaned.push(c),
        }
    }

    let mut paragraphs: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in cleaned.split('\n') {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(collapsed);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
        .iter()
        .map(|p| p.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n")
}
