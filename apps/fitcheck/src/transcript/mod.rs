//! Transcript Store — append-only, timestamp-ordered log of recruiter/candidate turns.
//!
//! Single writer, many readers. Readers take a `TranscriptSnapshot`, an owned copy, so later
//! appends never reach an analysis built from an earlier snapshot.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Recruiter,
    Candidate,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::Recruiter => f.write_str("Recruiter"),
            Sender::Candidate => f.write_str("Candidate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Smallest step used when a supplied timestamp has to be moved forward.
fn clamp_step() -> Duration {
    Duration::milliseconds(1)
}

#[derive(Debug, Default)]
pub struct TranscriptStore {
    messages: RwLock<Vec<ChatMessage>>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn. Blank text is rejected. A missing timestamp becomes "now"; one earlier
    /// than the last stored message is moved to just after it.
    pub fn append(
        &self,
        sender: Sender,
        text: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<ChatMessage, PipelineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::EmptyMessage);
        }

        let mut messages = self.messages.write().unwrap_or_else(PoisonError::into_inner);

        let requested = timestamp.unwrap_or_else(Utc::now);
        let timestamp = match messages.last() {
            Some(last) if requested < last.timestamp => {
                let clamped = last.timestamp + clamp_step();
                warn!(
                    "{} message timestamp {} precedes last message at {}, clamped to {}",
                    sender, requested, last.timestamp, clamped
                );
                clamped
            }
            _ => requested,
        };

        let message = ChatMessage {
            sender,
            text: text.to_string(),
            timestamp,
        };
        messages.push(message.clone());
        Ok(message)
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        let messages = self.messages.read().unwrap_or_else(PoisonError::into_inner);
        TranscriptSnapshot {
            messages: messages.clone(),
        }
    }

    pub fn clear(&self) {
        self.messages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An owned copy of the transcript at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TranscriptSnapshot {
    messages: Vec<ChatMessage>,
}

impl TranscriptSnapshot {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// At least one recruiter and one candidate message.
    pub fn has_both_sides(&self) -> bool {
        let recruiter = self.messages.iter().any(|m| m.sender == Sender::Recruiter);
        let candidate = self.messages.iter().any(|m| m.sender == Sender::Candidate);
        recruiter && candidate
    }

    /// The last `n` messages as a new snapshot.
    pub fn tail(&self, n: usize) -> TranscriptSnapshot {
        let start = self.messages.len().saturating_sub(n);
        TranscriptSnapshot {
            messages: self.messages[start..].to_vec(),
        }
    }

    /// One `Sender: text` line per message, in order.
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.sender, m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Vec<ChatMessage>> for TranscriptSnapshot {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }
}
