//! Rich-text parser: the non-empty paragraphs of a `.docx`, one per line.
//!
//! A `.docx` is a zip archive whose body lives in `word/document.xml`.
//! Paragraphs are `<w:p>` elements and their text sits in `<w:t>` runs.
//! Legacy binary `.doc` files are not archives, fail here and take the
//! loader's plain-text fallback.

use std::path::Path;

use crate::document::{Document, DocumentMetadata};
use crate::error::Result;

#[cfg(feature = "docx")]
pub(super) fn load(path: &Path, base: &DocumentMetadata) -> Result<Vec<Document>> {
    use std::io::Read;

    use crate::error::RagError;

    let shown = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| RagError::load(&shown, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| RagError::load(&shown, e))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| RagError::load(&shown, e))?
        .read_to_string(&mut xml)
        .map_err(|e| RagError::load(&shown, e))?;

    let text = paragraphs(&xml)
        .map_err(|e| RagError::load(&shown, e))?
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(vec![Document::new(text, base.clone())])
}

#[cfg(not(feature = "docx"))]
pub(super) fn load(path: &Path, base: &DocumentMetadata) -> Result<Vec<Document>> {
    tracing::warn!(
        path = %path.display(),
        "DOCX support not compiled in (enable the `docx` feature), using text extraction fallback"
    );
    super::text::load(path, base)
}

/// Paragraph texts of a WordprocessingML body, in document order.
#[cfg(feature = "docx")]
fn paragraphs(xml: &str) -> std::result::Result<Vec<String>, quick_xml::Error> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => current.clear(),
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                b"w:p" => paragraphs.push(String::new()),
                _ => {}
            },
            Event::Text(t) if in_text => current.push_str(&t.unescape()?),
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(paragraphs)
}

#[cfg(all(test, feature = "docx"))]
mod tests {
    use super::*;

    #[test]
    fn extracts_paragraph_runs() {
        let xml = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Acme &amp; Co</w:t></w:r><w:r><w:t xml:space="preserve"> supplies bolts.</w:t></w:r></w:p>
    <w:p/>
    <w:p><w:r><w:t>Second</w:t><w:tab/><w:t>para</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let paras = paragraphs(xml).unwrap();
        assert_eq!(paras, vec!["Acme & Co supplies bolts.", "", "Second\tpara"]);
    }
}
