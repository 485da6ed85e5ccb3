//! Document chunking.
//!
//! [`RecursiveChunker`] cuts a document into bounded, overlapping slices,
//! preferring paragraph breaks, then sentence ends, then spaces, and only
//! then raw character positions. Sizes are counted in characters.
//!
//! Every chunk is an exact slice of its document and records its character
//! span, so the document can be rebuilt by concatenating chunks and dropping
//! the part of each one that overlaps its predecessor.

use std::ops::Range;

use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text, span and metadata but no id
/// or embedding; the index assigns both.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document is empty or whitespace-only.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// Split every document, preserving document order.
    fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|d| self.chunk(d)).collect()
    }
}

/// Boundary levels tried from coarsest to finest before cutting raw characters.
const SEPARATOR_LEVELS: &[&[&str]] = &[&["\n\n"], &[". ", "! ", "? ", "\n"], &[" "]];

/// Splits text hierarchically: paragraphs → sentences → words → characters.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(500, 50)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless `0 <= chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Create a chunker from the sizes in `config`.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Character spans covering all of `text`, whitespace-only ones included.
    ///
    /// [`Chunker::chunk`] drops the whitespace-only spans.
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let offsets = char_offsets(text);
        let char_len = offsets.len() - 1;

        let mut pieces = Vec::new();
        split_pieces(text, &offsets, 0..char_len, SEPARATOR_LEVELS, self.chunk_size, &mut pieces);
        merge_pieces(&pieces, self.chunk_size, self.chunk_overlap)
    }
}

/// Byte offset of every character, plus `text.len()` as a sentinel.
fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect()
}

/// Cut `span` into contiguous pieces no longer than `max`, splitting after
/// separators of the first level that has any and recursing into oversized
/// pieces with the finer levels.
fn split_pieces(
    text: &str,
    offsets: &[usize],
    span: Range<usize>,
    levels: &[&[&str]],
    max: usize,
    out: &mut Vec<Range<usize>>,
) {
    if span.len() <= max {
        if !span.is_empty() {
            out.push(span);
        }
        return;
    }

    // Single characters, so the merge step can still start the next chunk
    // inside the previous one.
    let Some((level, finer)) = levels.split_first() else {
        out.extend(span.map(|c| c..c + 1));
        return;
    };

    let byte_start = offsets[span.start];
    let slice = &text[byte_start..offsets[span.end]];

    // Separators stay attached to the segment they end.
    let mut cuts: Vec<usize> = level
        .iter()
        .flat_map(|sep| slice.match_indices(sep).map(move |(pos, _)| pos + sep.len()))
        .filter(|&cut| cut < slice.len())
        .collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut segment_start = span.start;
    for cut in cuts {
        let idx = offsets.binary_search(&(byte_start + cut)).unwrap_or_else(|i| i);
        if idx > segment_start {
            split_pieces(text, offsets, segment_start..idx, finer, max, out);
            segment_start = idx;
        }
    }
    split_pieces(text, offsets, segment_start..span.end, finer, max, out);
}

/// Greedily pack contiguous pieces into chunks of at most `max` characters.
///
/// Each following chunk restarts at the earliest piece boundary that keeps
/// the shared tail within `overlap` and still leaves room for the next
/// unconsumed piece.
fn merge_pieces(pieces: &[Range<usize>], max: usize, overlap: usize) -> Vec<Range<usize>> {
    let mut chunks = Vec::new();
    let mut i = 0;

    while i < pieces.len() {
        let start = pieces[i].start;
        let mut last = i;
        while last + 1 < pieces.len() && pieces[last + 1].end - start <= max {
            last += 1;
        }
        let end = pieces[last].end;
        chunks.push(start..end);

        let Some(next) = pieces.get(last + 1) else {
            break;
        };
        let mut j = i + 1;
        while j <= last
            && (pieces[j].start < end.saturating_sub(overlap) || next.end - pieces[j].start > max)
        {
            j += 1;
        }
        i = j;
    }

    chunks
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let spans = self.spans(&document.text);
        if spans.is_empty() {
            return Vec::new();
        }
        let offsets = char_offsets(&document.text);

        spans
            .into_iter()
            .map(|span| (&document.text[offsets[span.start]..offsets[span.end]], span))
            .filter(|(text, _)| !text.trim().is_empty())
            .enumerate()
            .map(|(ordinal, (text, span))| Chunk {
                id: String::new(),
                text: text.to_string(),
                metadata: document.metadata.clone(),
                ordinal,
                start: span.start,
                end: span.end,
                embedding: Vec::new(),
            })
            .collect()
    }
}

/// Rebuild `text` from its [`spans`](RecursiveChunker::spans), dropping overlaps.
pub fn reconstruct(text: &str, spans: &[Range<usize>]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut rebuilt = String::new();
    let mut covered = 0usize;
    for span in spans {
        let from = covered.max(span.start).min(span.end);
        rebuilt.extend(&chars[from..span.end]);
        covered = covered.max(span.end);
    }
    rebuilt
}
