//! Tabular parser: one document per row, dialect sniffed from a sample.

use std::path::Path;

use tracing::{debug, warn};

use crate::document::{Document, DocumentMetadata};
use crate::error::{RagError, Result};

/// Bytes inspected when sniffing the dialect.
const SAMPLE_BYTES: usize = 1024;

/// Delimiters tried in order of preference.
const CANDIDATE_DELIMITERS: &[u8] = b",\t;|:";

/// Rows considered by the header heuristic.
const HEADER_PROBE_ROWS: usize = 20;

/// A delimiter plus whether the first row is a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Field delimiter.
    pub delimiter: u8,
    /// Whether the first row names the columns.
    pub has_header: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self { delimiter: b',', has_header: true }
    }
}

/// Guess the dialect of a sample of complete lines.
///
/// A delimiter is accepted when it occurs the same non-zero number of times
/// (outside double quotes) on every non-empty line. Returns `None` when no
/// candidate is consistent.
pub fn sniff_dialect(sample: &str) -> Option<Dialect> {
    let lines: Vec<&str> = sample.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return None;
    }

    let delimiter = CANDIDATE_DELIMITERS.iter().copied().find(|&d| {
        let first = count_outside_quotes(lines[0], d);
        first > 0 && lines.iter().all(|l| count_outside_quotes(l, d) == first)
    })?;

    let rows = read_rows(sample, delimiter);
    Some(Dialect { delimiter, has_header: looks_like_header(&rows) })
}

fn count_outside_quotes(line: &str, delimiter: u8) -> usize {
    let mut quoted = false;
    let mut count = 0;
    for b in line.bytes() {
        if b == b'"' {
            quoted = !quoted;
        } else if b == delimiter && !quoted {
            count += 1;
        }
    }
    count
}

fn read_rows(sample: &str, delimiter: u8) -> Vec<Vec<String>> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(sample.as_bytes())
        .records()
        .filter_map(|r| r.ok())
        .take(HEADER_PROBE_ROWS + 1)
        .map(|r| r.iter().map(str::to_string).collect())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Numeric,
    Length(usize),
}

fn cell_kind(cell: &str) -> CellKind {
    if cell.trim().parse::<f64>().is_ok() {
        CellKind::Numeric
    } else {
        CellKind::Length(cell.chars().count())
    }
}

/// Vote column by column: a column whose data cells share one kind (numeric,
/// or a fixed length) votes for a header when the first cell differs from
/// that kind. Mixed columns abstain.
fn looks_like_header(rows: &[Vec<String>]) -> bool {
    let Some((header, data)) = rows.split_first() else {
        return false;
    };

    let mut votes = 0i32;
    for (col, head) in header.iter().enumerate() {
        let mut kind = None;
        let mut consistent = true;
        for row in data.iter().filter(|r| r.len() == header.len()) {
            let this = cell_kind(&row[col]);
            match kind {
                None => kind = Some(this),
                Some(k) if k == this => {}
                Some(_) => {
                    consistent = false;
                    break;
                }
            }
        }
        if !consistent {
            continue;
        }
        if let Some(k) = kind {
            votes += if cell_kind(head) == k { -1 } else { 1 };
        }
    }
    votes > 0
}

/// Leading sample of `content`, cut back to whole lines when truncated.
fn sample_of(content: &str) -> &str {
    if content.len() <= SAMPLE_BYTES {
        return content;
    }
    let mut end = SAMPLE_BYTES;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    let sample = &content[..end];
    match sample.rfind('\n') {
        Some(pos) => &sample[..pos],
        None => sample,
    }
}

pub(super) fn load(path: &Path, base: &DocumentMetadata, max_rows: usize) -> Result<Vec<Document>> {
    let shown = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| RagError::load(&shown, e))?;
    let content = String::from_utf8(bytes).map_err(|e| RagError::load(&shown, e))?;

    let dialect = sniff_dialect(sample_of(&content)).unwrap_or_else(|| {
        debug!(path = %shown, "could not sniff dialect, assuming comma with header");
        Dialect::default()
    });

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .has_headers(dialect.has_header)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = if dialect.has_header {
        Some(reader.headers().map_err(|e| RagError::load(&shown, e))?.clone())
    } else {
        None
    };

    let mut documents = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let row = i + 1;
        if row > max_rows {
            warn!(path = %shown, max_rows, "CSV file too large, processing first {max_rows} rows only");
            break;
        }
        let record = record.map_err(|e| RagError::load(&shown, e))?;
        let text = match &headers {
            Some(headers) => headers
                .iter()
                .zip(record.iter())
                .filter(|(_, value)| !value.is_empty())
                .map(|(key, value)| format!("{key}: {value}"))
                .collect::<Vec<_>>()
                .join("\n"),
            None => record
                .iter()
                .enumerate()
                .filter(|(_, value)| !value.is_empty())
                .map(|(idx, value)| format!("Column {}: {value}", idx + 1))
                .collect::<Vec<_>>()
                .join(" | "),
        };
        documents.push(Document::new(
            text,
            DocumentMetadata { row: Some(row as u32), ..base.clone() },
        ));
    }

    debug!(path = %shown, rows = documents.len(), ?dialect, "parsed table");
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_semicolons_with_header() {
        let sample = "supplier;employees\nAcme;120\nGlobex;45\nInitech;9\n";
        let dialect = sniff_dialect(sample).unwrap();
        assert_eq!(dialect.delimiter, b';');
        assert!(dialect.has_header);
    }

    #[test]
    fn all_numeric_rows_have_no_header() {
        let dialect = sniff_dialect("1,2,3\n4,5,6\n7,8,9\n").unwrap();
        assert_eq!(dialect.delimiter, b',');
        assert!(!dialect.has_header);
    }

    #[test]
    fn quoted_delimiters_are_ignored() {
        let sample = "name,note\n\"Acme, Inc\",10\n\"Globex\",20\n";
        assert_eq!(sniff_dialect(sample).unwrap().delimiter, b',');
    }

    #[test]
    fn inconsistent_lines_fail_to_sniff() {
        assert_eq!(sniff_dialect("just one column\nanother line, with comma\n"), None);
        assert_eq!(sniff_dialect(""), None);
    }

    #[test]
    fn sample_is_cut_to_whole_lines() {
        let line = "abcdefghi,123\n";
        let content = line.repeat(200);
        let sample = sample_of(&content);
        assert!(sample.len() <= SAMPLE_BYTES);
        assert!(sample.lines().all(|l| l == "abcdefghi,123"));
    }
}
