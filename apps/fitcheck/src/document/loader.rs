//! Document Loader — turns a PDF or UTF-8 text source into a normalized `Document`.
//!
//! The loader reads the whole file into memory and drops the handle before decoding, so no
//! file handle outlives `load`. PDF extraction is CPU-bound and runs on the blocking pool.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info};

use crate::document::normalize::normalize_text;
use crate::document::{Document, SourceFormat, DEFAULT_MAX_FILE_SIZE};
use crate::errors::{PipelineError, UnreadableReason};

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    pub max_file_size: u64,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// Loads a document from disk. `declared` overrides format inference.
    pub async fn load(
        &self,
        path: &Path,
        declared: Option<SourceFormat>,
    ) -> Result<Document, PipelineError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| PipelineError::unreadable(path, UnreadableReason::Io, e.to_string()))?;

        if !meta.is_file() {
            return Err(PipelineError::unreadable(
                path,
                UnreadableReason::Io,
                "not a regular file",
            ));
        }
        self.check_size(path, meta.len())?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::unreadable(path, UnreadableReason::Io, e.to_string()))?;

        self.decode(path.to_path_buf(), Bytes::from(bytes), declared)
            .await
    }

    /// Loads a document already held in memory (an upload). `name` is used for format
    /// inference and error reporting.
    pub async fn load_bytes(
        &self,
        name: &str,
        bytes: Bytes,
        declared: Option<SourceFormat>,
    ) -> Result<Document, PipelineError> {
        let path = PathBuf::from(name);
        self.check_size(&path, bytes.len() as u64)?;
        self.decode(path, bytes, declared).await
    }

    fn check_size(&self, path: &Path, len: u64) -> Result<(), PipelineError> {
        if len > self.max_file_size {
            return Err(PipelineError::unreadable(
                path,
                UnreadableReason::TooLarge,
                format!("{len} bytes exceeds limit of {} bytes", self.max_file_size),
            ));
        }
        Ok(())
    }

    async fn decode(
        &self,
        path: PathBuf,
        bytes: Bytes,
        declared: Option<SourceFormat>,
    ) -> Result<Document, PipelineError> {
        let format = match declared
            .or_else(|| SourceFormat::from_extension(&path))
            .or_else(|| SourceFormat::sniff(&bytes))
        {
            Some(format) => format,
            None => {
                return Err(PipelineError::unreadable(
                    &path,
                    UnreadableReason::Unsupported,
                    "neither a PDF nor UTF-8 text",
                ))
            }
        };

        let text = match format {
            SourceFormat::Pdf => extract_pdf_text(&path, bytes.clone()).await?,
            SourceFormat::Text => decode_utf8(&path, &bytes)?,
        };

        let normalized = normalize_text(&text);
        if normalized.is_empty() {
            return Err(PipelineError::unreadable(
                &path,
                UnreadableReason::Empty,
                "no extractable text",
            ));
        }

        info!(
            "Loaded {:?} document {} ({} bytes → {} chars)",
            format,
            path.display(),
            bytes.len(),
            normalized.chars().count()
        );

        Ok(Document::from_parts(path, format, bytes, normalized))
    }
}

fn decode_utf8(path: &Path, bytes: &[u8]) -> Result<String, PipelineError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| {
            PipelineError::unreadable(path, UnreadableReason::Corrupt, format!("not UTF-8: {e}"))
        })
}

/// Extracts all pages in order. Any failure (including an extractor panic on malformed
/// input) fails the whole document.
async fn extract_pdf_text(path: &Path, bytes: Bytes) -> Result<String, PipelineError> {
    if !bytes.starts_with(b"%PDF-") {
        return Err(PipelineError::unreadable(
            path,
            UnreadableReason::Corrupt,
            "missing %PDF- header",
        ));
    }

    let text = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| {
        PipelineError::unreadable(
            path,
            UnreadableReason::Corrupt,
            format!("PDF extractor aborted: {e}"),
        )
    })?
    .map_err(|msg| PipelineError::unreadable(path, classify_pdf_error(&msg), msg))?;

    debug!("Extracted {} raw chars from {}", text.len(), path.display());
    Ok(text)
}

fn classify_pdf_error(message: &str) -> UnreadableReason {
    let lower = message.to_lowercase();
    if lower.contains("encrypt") || lower.contains("password") || lower.contains("decrypt") {
        UnreadableReason::Encrypted
    } else {
        UnreadableReason::Corrupt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal single-page PDF whose content stream is `content`.
    fn minimal_pdf(content: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let o1 = out.len();
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        let o2 = out.len();
        out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        let o3 = out.len();
        out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
        let o4 = out.len();
        out.extend_from_slice(
            format!(
                "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content.len(),
                content
            )
            .as_bytes(),
        );
        let o5 = out.len();
        out.extend_from_slice(
            b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
        );
        let xref_start = out.len();
        out.extend_from_slice(b"xref\n0 6\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in [o1, o2, o3, o4, o5] {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    #[tokio::test]
    async fn test_load_text_file_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("jd.txt");
        std::fs::write(&file, "Senior  Rust Engineer\r\n\r\n\r\nRemote\u{0007}").unwrap();

        let doc = DocumentLoader::default().load(&file, None).await.unwrap();
        assert_eq!(doc.source_format(), SourceFormat::Text);
        assert_eq!(doc.text(), "Senior Rust Engineer\n\nRemote");
        assert_eq!(doc.source_path(), file.as_path());
    }

    #[tokio::test]
    async fn test_pdf_without_text_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("scanned.pdf");
        std::fs::write(&file, minimal_pdf("BT ET")).unwrap();

        let err = DocumentLoader::default().load(&file, None).await.unwrap_err();
        assert_eq!(err.reason(), Some("empty"));
        assert_eq!(err.kind(), "unreadable_source");
    }

    #[tokio::test]
    async fn test_garbage_with_pdf_extension_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.pdf");
        std::fs::write(&file, b"this is not a pdf").unwrap();

        let err = DocumentLoader::default().load(&file, None).await.unwrap_err();
        assert_eq!(err.reason(), Some("corrupt"));
    }

    #[tokio::test]
    async fn test_truncated_pdf_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("truncated.pdf");
        std::fs::write(&file, b"%PDF-1.4\n1 0 obj << /Type /Cat").unwrap();

        let err = DocumentLoader::default().load(&file, None).await.unwrap_err();
        assert_eq!(err.reason(), Some("corrupt"));
    }

    #[tokio::test]
    async fn test_empty_text_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.txt");
        std::fs::write(&file, "  \n\n ").unwrap();

        let err = DocumentLoader::default().load(&file, None).await.unwrap_err();
        assert_eq!(err.reason(), Some("empty"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_text_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("latin1.txt");
        std::fs::write(&file, [0x52, 0xe9, 0x73, 0x75, 0x6d, 0xe9]).unwrap();

        let err = DocumentLoader::default().load(&file, None).await.unwrap_err();
        assert_eq!(err.reason(), Some("corrupt"));
    }

    #[tokio::test]
    async fn test_missing_file_is_io() {
        let err = DocumentLoader::default()
            .load(Path::new("/nonexistent/resume.pdf"), None)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some("io"));
    }

    #[tokio::test]
    async fn test_file_too_large_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.txt");
        std::fs::write(&file, "xx").unwrap();

        let err = DocumentLoader::new(1).load(&file, None).await.unwrap_err();
        assert_eq!(err.reason(), Some("too_large"));
    }

    #[tokio::test]
    async fn test_unknown_extension_sniffed_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("resume");
        std::fs::write(&file, "Jane Doe\nRust").unwrap();

        let doc = DocumentLoader::default().load(&file, None).await.unwrap();
        assert_eq!(doc.source_format(), SourceFormat::Text);
    }

    #[tokio::test]
    async fn test_declared_format_overrides_extension() {
        let err = DocumentLoader::default()
            .load_bytes("notes.txt", Bytes::from_static(b"plain"), Some(SourceFormat::Pdf))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some("corrupt"));
    }

    #[tokio::test]
    async fn test_load_bytes_strips_bom() {
        let doc = DocumentLoader::default()
            .load_bytes("jd.txt", Bytes::from_static(b"\xEF\xBB\xBFRust role"), None)
            .await
            .unwrap();
        assert_eq!(doc.text(), "Rust role");
    }

    #[test]
    fn test_classify_pdf_error() {
        assert_eq!(
            classify_pdf_error("Document is encrypted"),
            UnreadableReason::Encrypted
        );
        assert_eq!(
            classify_pdf_error("invalid cross-reference table"),
            UnreadableReason::Corrupt
        );
    }
}
