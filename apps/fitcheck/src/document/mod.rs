//! Documents — normalized text extracted from a resume or job description file.

pub mod loader;
pub mod normalize;

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, UnreadableReason};

pub use loader::DocumentLoader;
pub use normalize::normalize_text;

/// Largest file the loader accepts unless configured otherwise (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Text,
}

impl SourceFormat {
    /// Format implied by the file extension, if the extension is one we know.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(SourceFormat::Pdf),
            "txt" | "text" | "md" | "markdown" => Some(SourceFormat::Text),
            _ => None,
        }
    }

    /// Format implied by the content: PDF magic bytes, otherwise UTF-8 text.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF-") {
            Some(SourceFormat::Pdf)
        } else if std::str::from_utf8(bytes).is_ok() {
            Some(SourceFormat::Text)
        } else {
            None
        }
    }
}

/// Which role a document plays in an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentRole {
    JobDescription,
    Resume,
}

/// A loaded, normalized document. Immutable once constructed; share it as `Arc<Document>`.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    source_path: PathBuf,
    source_format: SourceFormat,
    #[serde(skip)]
    raw_bytes: Bytes,
    normalized_text: String,
    loaded_at: DateTime<Utc>,
}

impl Document {
    /// Builds a document from raw text already in memory (e.g. a pasted job description).
    pub fn from_text(source: impl Into<PathBuf>, text: &str) -> Result<Self, PipelineError> {
        let source_path = source.into();
        let normalized_text = normalize_text(text);
        if normalized_text.is_empty() {
            return Err(PipelineError::unreadable(
                source_path,
                UnreadableReason::Empty,
                "no text after normalization",
            ));
        }
        Ok(Self {
            source_path,
            source_format: SourceFormat::Text,
            raw_bytes: Bytes::copy_from_slice(text.as_bytes()),
            normalized_text,
            loaded_at: Utc::now(),
        })
    }

    pub(crate) fn from_parts(
        source_path: PathBuf,
        source_format: SourceFormat,
        raw_bytes: Bytes,
        normalized_text: String,
    ) -> Self {
        Self {
            source_path,
            source_format,
            raw_bytes,
            normalized_text,
            loaded_at: Utc::now(),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn source_format(&self) -> SourceFormat {
        self.source_format
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    pub fn text(&self) -> &str {
        &self.normalized_text
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            SourceFormat::from_extension(Path::new("cv.PDF")),
            Some(SourceFormat::Pdf)
        );
        assert_eq!(
            SourceFormat::from_extension(Path::new("jd.md")),
            Some(SourceFormat::Text)
        );
        assert_eq!(SourceFormat::from_extension(Path::new("cv.docx")), None);
        assert_eq!(SourceFormat::from_extension(Path::new("README")), None);
    }

    #[test]
    fn test_sniff_detects_pdf_magic() {
        assert_eq!(SourceFormat::sniff(b"%PDF-1.7\n..."), Some(SourceFormat::Pdf));
        assert_eq!(SourceFormat::sniff(b"plain resume"), Some(SourceFormat::Text));
        assert_eq!(SourceFormat::sniff(&[0xff, 0xfe, 0x00, 0xd8]), None);
    }

    #[test]
    fn test_from_text_normalizes() {
        let doc = Document::from_text("pasted", "  Rust   engineer \n\n\n Remote ").unwrap();
        assert_eq!(doc.text(), "Rust engineer\n\nRemote");
        assert_eq!(doc.source_format(), SourceFormat::Text);
    }

    #[test]
    fn test_from_text_rejects_blank() {
        let err = Document::from_text("pasted", " \n\t ").unwrap_err();
        assert_eq!(err.reason(), Some("empty"));
    }

    #[test]
    fn test_role_serde_is_kebab_case() {
        let role: DocumentRole = serde_json::from_str(r#""job-description""#).unwrap();
        assert_eq!(role, DocumentRole::JobDescription);
    }

    #[test]
    fn test_serialized_document_omits_raw_bytes() {
        let doc = Document::from_text("jd.txt", "Rust").unwrap();
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("raw_bytes").is_none());
        assert_eq!(value["normalized_text"], "Rust");
        assert_eq!(value["source_format"], "text");
    }
}
