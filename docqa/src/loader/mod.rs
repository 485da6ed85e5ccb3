//! Format-tolerant document loading.
//!
//! [`DocumentLoader::load`] dispatches on the file extension to a specialized
//! parser. A parser failure never fails the file: the loader logs it and
//! falls back to reading the file as plain text.
//!
//! | Extension | Parser | Documents emitted |
//! |-----------|--------|-------------------|
//! | `.txt`, `.md` | plain text | one |
//! | `.csv` | tabular | one per row, at most [`MAX_TABLE_ROWS`] |
//! | `.pdf` | paginated (`pdf` feature) | one per non-empty page |
//! | `.docx`, `.doc` | rich text (`docx` feature) | one |

mod docx;
mod pdf;
mod tabular;
mod text;

use std::path::Path;

use tracing::{error, info};

use crate::document::{Document, DocumentMetadata};
use crate::error::{RagError, Result};

pub use tabular::{Dialect, sniff_dialect};

/// Extensions the loader accepts, lowercase with the leading dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".pdf", ".txt", ".docx", ".doc", ".csv", ".md"];

/// Default cap on rows read from one tabular file.
pub const MAX_TABLE_ROWS: usize = 1000;

/// The parser family chosen for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `.txt` and `.md`.
    Text,
    /// `.csv`.
    Table,
    /// `.pdf`.
    Paginated,
    /// `.docx` and `.doc`.
    RichText,
}

impl FileKind {
    /// Classify `path` by its extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        match extension_of(path).as_str() {
            ".txt" | ".md" => Some(Self::Text),
            ".csv" => Some(Self::Table),
            ".pdf" => Some(Self::Paginated),
            ".docx" | ".doc" => Some(Self::RichText),
            _ => None,
        }
    }
}

/// Lowercased extension of `path` with a leading dot, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Whether the loader has a parser for `path`.
pub fn is_supported(path: &Path) -> bool {
    FileKind::from_path(path).is_some()
}

/// File name component of `path`, falling back to the whole path.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Converts files into [`Document`]s.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    max_rows: usize,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self { max_rows: MAX_TABLE_ROWS }
    }
}

impl DocumentLoader {
    /// Create a loader with the default row cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the row cap for tabular files.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Load `path` into documents.
    ///
    /// # Errors
    ///
    /// - [`RagError::UnsupportedFileType`] for an extension outside
    ///   [`SUPPORTED_EXTENSIONS`].
    /// - [`RagError::Load`] if the file does not exist or even the
    ///   plain-text fallback cannot read it.
    pub fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let kind = FileKind::from_path(path)
            .ok_or_else(|| RagError::UnsupportedFileType { extension: extension_of(path) })?;

        let shown = path.display().to_string();
        if !path.is_file() {
            return Err(RagError::load(&shown, "File not found"));
        }

        info!(path = %shown, ?kind, "loading document");
        let base = DocumentMetadata {
            source: file_name_of(path),
            file_path: shown.clone(),
            page: None,
            row: None,
        };

        let parsed = match kind {
            FileKind::Text => text::load(path, &base),
            FileKind::Table => tabular::load(path, &base, self.max_rows),
            FileKind::Paginated => pdf::load(path, &base),
            FileKind::RichText => docx::load(path, &base),
        };

        match parsed {
            Ok(documents) => Ok(documents),
            Err(e) if kind != FileKind::Text => {
                error!(path = %shown, error = %e, "parser failed, falling back to plain text");
                text::load(path, &base)
            }
            Err(e) => Err(e),
        }
    }
}
