//! Plain-text extraction for uploaded documents.
//!
//! Callers supply bytes plus a declared type; this module returns plain
//! UTF-8 text. Text files are decoded strictly; PDFs are extracted per page
//! and concatenated in page order. Anything else is an unsupported format —
//! the error is returned, never a panic, so batch ingestion can skip the
//! offending file and continue.

use std::path::Path;

/// Declared type of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
}

impl DocumentKind {
    /// Map a file extension to a document kind. Returns `None` for
    /// unrecognized extensions.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "text" | "md" => Some(DocumentKind::Text),
            "pdf" => Some(DocumentKind::Pdf),
            _ => None,
        }
    }
}

/// Extraction error. Batch ingestion collects these per file.
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedFormat(String),
    Encoding(String),
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedFormat(name) => {
                write!(f, "unsupported document format: {}", name)
            }
            ExtractError::Encoding(e) => write!(f, "text decoding failed: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Resolve a path's declared kind, or fail with the offending file name.
pub fn detect_kind(path: &Path) -> Result<DocumentKind, ExtractError> {
    DocumentKind::from_path(path)
        .ok_or_else(|| ExtractError::UnsupportedFormat(path.display().to_string()))
}

/// Extract plain text from raw document bytes per the declared kind.
pub fn extract_text(bytes: &[u8], kind: DocumentKind) -> Result<String, ExtractError> {
    match kind {
        DocumentKind::Text => String::from_utf8(bytes.to_vec())
            .map_err(|e| ExtractError::Encoding(e.to_string())),
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractError::Pdf(e.to_string())),
    }
}
