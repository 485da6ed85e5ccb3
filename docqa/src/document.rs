//! Data types for documents, chunks, search results and answers.

use serde::{Deserialize, Serialize};

/// Where a piece of text came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DocumentMetadata {
    /// File name only, never the full path.
    pub source: String,
    /// Path the file was loaded from.
    pub file_path: String,
    /// 1-based page number for paginated documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// 1-based data row number for tabular documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
}

/// A plain-text unit produced by the loader.
///
/// One file may yield many documents, for example one per page or row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The extracted text.
    pub text: String,
    /// Source metadata shared by every chunk cut from this document.
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a document from text and metadata.
    pub fn new(text: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self { text: text.into(), metadata }
    }

    /// The file name this document was loaded from.
    pub fn source(&self) -> &str {
        &self.metadata.source
    }
}

/// A bounded slice of a [`Document`] and, once indexed, its embedding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Entry identity. Empty until the chunk is indexed; persisted with it.
    pub id: String,
    /// The chunk text, an exact slice of the parent document.
    pub text: String,
    /// Metadata inherited unchanged from the parent document.
    pub metadata: DocumentMetadata,
    /// Position of this chunk among its document's chunks.
    pub ordinal: usize,
    /// Character offset of the first character in the parent document.
    pub start: usize,
    /// Character offset one past the last character in the parent document.
    pub end: usize,
    /// The vector embedding, empty until indexed.
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// The file name this chunk was cut from.
    pub fn source(&self) -> &str {
        &self.metadata.source
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// How a retrieval ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrievalStatus {
    /// At least one chunk was found.
    Matched,
    /// The search ran and found nothing, typically because the index is empty.
    NoMatches,
    /// The backend failed; the result is empty for that reason.
    Degraded {
        /// The swallowed error.
        reason: String,
    },
}

/// The chunks found for a query plus their distinct sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Chunks ordered by descending relevance; diversified additions come last.
    pub chunks: Vec<Chunk>,
    /// Distinct `source` values of `chunks` in first-seen order.
    pub sources: Vec<String>,
    /// Whether the result is a real match, a real miss, or a failure.
    pub status: RetrievalStatus,
}

impl RetrievalResult {
    /// Build a result from chunks, deriving sources and status.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let sources = distinct_sources(&chunks);
        let status =
            if chunks.is_empty() { RetrievalStatus::NoMatches } else { RetrievalStatus::Matched };
        Self { chunks, sources, status }
    }

    /// An empty result with no error.
    pub fn empty() -> Self {
        Self::from_chunks(Vec::new())
    }

    /// An empty result caused by a backend failure.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            chunks: Vec::new(),
            sources: Vec::new(),
            status: RetrievalStatus::Degraded { reason: reason.into() },
        }
    }

    /// Append chunks and recompute the source set.
    pub fn extend(&mut self, more: impl IntoIterator<Item = Chunk>) {
        self.chunks.extend(more);
        self.sources = distinct_sources(&self.chunks);
        if !self.chunks.is_empty() && self.status == RetrievalStatus::NoMatches {
            self.status = RetrievalStatus::Matched;
        }
    }

    /// Number of chunks retrieved.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunk was retrieved.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Distinct sources of `chunks`, preserving first-seen order.
pub fn distinct_sources(chunks: &[Chunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for chunk in chunks {
        if !sources.iter().any(|s| s == chunk.source()) {
            sources.push(chunk.source().to_string());
        }
    }
    sources
}

/// Per-file ingestion status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Every chunk of the file was indexed.
    Success,
    /// The file was not indexed.
    Failed,
}

/// Outcome of ingesting one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileResult {
    /// File name only.
    pub filename: String,
    /// Whether the file ended up indexed.
    pub status: FileStatus,
    /// Chunks produced for the file; always 0 when failed.
    pub chunks_created: usize,
    /// Why the file failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileResult {
    pub(crate) fn success(filename: impl Into<String>, chunks_created: usize) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Success,
            chunks_created,
            error: None,
        }
    }

    pub(crate) fn failed(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Failed,
            chunks_created: 0,
            error: Some(error.into()),
        }
    }

    /// Whether the file was indexed.
    pub fn is_success(&self) -> bool {
        self.status == FileStatus::Success
    }
}

/// Health of the index backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    /// The backend answered.
    Healthy,
    /// The backend failed.
    Error,
}

/// Index introspection returned by `status()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexStatus {
    /// Number of entries in the collection (0 on error).
    pub document_count: usize,
    /// Where the backend keeps its data.
    pub persist_location: String,
    /// Whether the backend answered.
    pub status: Health,
    /// Backend error message when unhealthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// How an answer was produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// The model answered from retrieved context.
    Answered,
    /// Nothing relevant was indexed.
    NoContext,
    /// The index failed, so no context was available.
    RetrievalDegraded,
    /// The question was blank.
    InvalidQuestion,
    /// The model call failed and the apology text was substituted.
    GenerationFailed,
    /// An unexpected failure was contained by the orchestrator.
    Failed,
}

/// The result of answering one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The answer text.
    #[serde(rename = "answer")]
    pub text: String,
    /// Distinct source file names used as context.
    pub sources: Vec<String>,
    /// Wall time in seconds, rounded to two decimals.
    pub processing_time: f64,
    /// Number of chunks handed to the synthesizer.
    pub documents_used: usize,
    /// How the answer was produced.
    pub outcome: AnswerOutcome,
}
