//! Paginated-document parser: one document per page with text.
//!
//! Extraction needs the `pdf` feature. Without it the raw bytes are read as
//! plain text.

use std::path::Path;

use crate::document::{Document, DocumentMetadata};
use crate::error::Result;

#[cfg(feature = "pdf")]
pub(super) fn load(path: &Path, base: &DocumentMetadata) -> Result<Vec<Document>> {
    use pdf_oxide::PdfDocument;
    use tracing::debug;

    use crate::error::RagError;

    let shown = path.display().to_string();
    let mut pdf = PdfDocument::open(path).map_err(|e| RagError::load(&shown, e))?;
    let page_count = pdf.page_count().map_err(|e| RagError::load(&shown, e))?;

    let mut documents = Vec::new();
    for index in 0..page_count {
        let text = pdf.extract_text(index).map_err(|e| RagError::load(&shown, e))?;
        if text.trim().is_empty() {
            debug!(path = %shown, page = index + 1, "skipping page without text");
            continue;
        }
        documents.push(Document::new(
            text,
            DocumentMetadata { page: Some(index as u32 + 1), ..base.clone() },
        ));
    }
    Ok(documents)
}

#[cfg(not(feature = "pdf"))]
pub(super) fn load(path: &Path, base: &DocumentMetadata) -> Result<Vec<Document>> {
    tracing::warn!(
        path = %path.display(),
        "PDF support not compiled in (enable the `pdf` feature), using text extraction fallback"
    );
    super::text::load(path, base)
}
