//! Plain-text parser with a Latin-1 fallback for non-UTF-8 files.

use std::path::Path;

use tracing::debug;

use crate::document::{Document, DocumentMetadata};
use crate::error::{RagError, Result};

pub(super) fn load(path: &Path, base: &DocumentMetadata) -> Result<Vec<Document>> {
    let bytes = std::fs::read(path).map_err(|e| RagError::load(path.display().to_string(), e))?;
    Ok(vec![Document::new(decode(bytes), base.clone())])
}

/// Decode as UTF-8, re-decoding as Latin-1 when that fails.
///
/// Latin-1 maps every byte to the code point of the same value, so the
/// fallback cannot fail.
pub(super) fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            debug!(valid_up_to = e.utf8_error().valid_up_to(), "not UTF-8, decoding as Latin-1");
            e.as_bytes().iter().map(|&b| char::from(b)).collect()
        }
    }
}
