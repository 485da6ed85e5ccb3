//! # docqa
//!
//! Question answering over an uploaded document collection.
//!
//! ## Overview
//!
//! - [`DocumentLoader`] turns `.txt`, `.md`, `.csv`, `.pdf`, `.docx` and
//!   `.doc` files into plain-text [`Document`]s, falling back to plain text
//!   when a format parser fails.
//! - [`RecursiveChunker`] cuts documents into overlapping chunks on natural
//!   boundaries.
//! - [`EmbeddingIndex`] embeds chunks in paced batches into a
//!   [`VectorStore`] ([`InMemoryVectorStore`] or the persistent
//!   [`FileVectorStore`]).
//! - [`Diversifier`] retrieves context and widens it to other sources when
//!   one file dominates.
//! - [`AnswerSynthesizer`] asks a [`LanguageModel`] for an answer grounded in
//!   the context, grouped by source.
//! - [`RagPipeline`] wires these together and never fails a question.
//!
//! ## Features
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `docx` (default) | `.docx` parsing via `zip` + `quick-xml` |
//! | `pdf` | `.pdf` text extraction via `pdf_oxide` |
//! | `openai` | [`openai::OpenAIEmbeddingProvider`], [`openai::OpenAIChatModel`] |
//! | `gemini` | [`gemini::GeminiEmbeddingProvider`], [`gemini::GeminiModel`] |
//!
//! Without `pdf` or `docx`, those files are read as plain text.

pub mod chunking;
pub mod config;
pub mod diversify;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod inmemory;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod persistent;
pub mod pipeline;
pub mod synthesis;
pub mod vectorstore;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder, ResetPolicy};
pub use diversify::Diversifier;
pub use document::{
    Answer, AnswerOutcome, Chunk, Document, DocumentMetadata, FileResult, FileStatus, Health,
    IndexStatus, RetrievalResult, RetrievalStatus, SearchResult,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use index::EmbeddingIndex;
pub use inmemory::InMemoryVectorStore;
pub use llm::{GenerationParams, LanguageModel};
pub use loader::{DocumentLoader, FileKind, SUPPORTED_EXTENSIONS};
pub use persistent::FileVectorStore;
pub use pipeline::{RagPipeline, RagPipelineBuilder, validate_question};
pub use synthesis::{AnswerSynthesizer, Synthesis, SynthesisStatus};
pub use vectorstore::VectorStore;
