//! Document ingestion: uploaded documents to plain text
//!
//! PDFs go through `pdf-extract`; everything else supported is read as
//! UTF-8 text.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Extensions read as UTF-8 text
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown", "rst", "csv", "log"];

/// Extension whose text layer is extracted
pub const PDF_EXTENSION: &str = "pdf";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{}: unsupported document type (supported: {}, {})", .path.display(), PDF_EXTENSION, TEXT_EXTENSIONS.join(", "))]
    Unsupported { path: PathBuf },

    #[error("{}: no readable text found", .path.display())]
    NoText { path: PathBuf },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    pub fn is_no_text(&self) -> bool {
        matches!(self, IngestError::NoText { .. })
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase())
}

fn is_pdf(path: &Path) -> bool {
    extension(path).is_some_and(|e| e == PDF_EXTENSION)
}

/// Whether a path is a PDF or has one of the text extensions
pub fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|e| e == PDF_EXTENSION || TEXT_EXTENSIONS.contains(&e.as_str()))
}

/// Read a document and return its text
///
/// Non-UTF-8 or whitespace-only content is `NoText`.
pub fn extract_text(path: &Path) -> Result<String, IngestError> {
    debug!(?path, "extract_text: called");
    if !is_supported(path) {
        return Err(IngestError::Unsupported { path: path.to_path_buf() });
    }

    let bytes = std::fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    extract_from_bytes(path, &bytes)
}

/// Text from an in-memory upload; `path` only picks the format
pub fn extract_from_bytes(path: &Path, bytes: &[u8]) -> Result<String, IngestError> {
    let no_text = || IngestError::NoText { path: path.to_path_buf() };
    let text = if is_pdf(path) {
        pdf_text(path, bytes).ok_or_else(no_text)?
    } else {
        std::str::from_utf8(bytes).map_err(|_| no_text())?.to_string()
    };

    let text = text.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        debug!(?path, "extract_from_bytes: empty document");
        return Err(no_text());
    }
    Ok(text.to_string())
}

/// Text layer of a PDF, or None when it cannot be parsed
///
/// Scanned PDFs without a text layer come back empty.
fn pdf_text(path: &Path, bytes: &[u8]) -> Option<String> {
    debug!(?path, len = bytes.len(), "pdf_text: called");
    // pdf-extract panics on some malformed files
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Some(text),
        Ok(Err(e)) => {
            warn!(?path, error = %e, "Failed to parse PDF");
            None
        }
        Err(_) => {
            warn!(?path, "PDF parser panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reads_markdown() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.md");
        std::fs::write(&path, "\u{feff}# Notes\n\nOwnership rules.\n").unwrap();

        assert_eq!(extract_text(&path).unwrap(), "# Notes\n\nOwnership rules.");
    }

    #[test]
    fn test_blank_document_has_no_text() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.txt");
        std::fs::write(&path, "   \n\n").unwrap();

        assert!(extract_text(&path).unwrap_err().is_no_text());
    }

    #[test]
    fn test_binary_has_no_text() {
        let err = extract_from_bytes(Path::new("scan.txt"), &[0xff, 0xfe, 0x00, 0x9f]).unwrap_err();
        assert!(err.is_no_text());
    }

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
    }

    #[test]
    fn test_unsupported_extension() {
        let err = extract_text(Path::new("slides.pptx")).unwrap_err();
        assert!(matches!(err, IngestError::Unsupported { .. }));
        assert!(is_supported(Path::new("README.MD")));
        assert!(is_supported(Path::new("Report.PDF")));
    }

    #[test]
    fn test_reads_pdf_text_layer() {
        let text = extract_text(&fixture("ownership.pdf")).unwrap();
        assert!(text.contains("Ownership"), "got {:?}", text);
    }

    #[test]
    fn test_pdf_without_text_has_no_text() {
        assert!(extract_text(&fixture("blank.pdf")).unwrap_err().is_no_text());
    }

    #[test]
    fn test_corrupt_pdf_has_no_text() {
        let err = extract_from_bytes(Path::new("broken.pdf"), b"%PDF-1.4 not really").unwrap_err();
        assert!(err.is_no_text());
    }
}
