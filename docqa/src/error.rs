//! Error types for the `docqa` crate.

use thiserror::Error;

/// Errors that can occur while ingesting, indexing or answering.
///
/// Only ingestion setup can surface these to a caller: retrieval and
/// generation failures are folded into [`RetrievalStatus`](crate::RetrievalStatus)
/// and [`SynthesisStatus`](crate::SynthesisStatus) instead.
#[derive(Debug, Error)]
pub enum RagError {
    /// The file extension is not in the loader's allow-list.
    #[error("Unsupported file type: {extension}")]
    UnsupportedFileType {
        /// The rejected extension, including the leading dot.
        extension: String,
    },

    /// The question is empty or outside the accepted length bounds.
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    /// A file could not be read or parsed.
    #[error("Failed to load {path}: {message}")]
    Load {
        /// Path of the file being loaded.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model call failed.
    #[error("Generation error ({model}): {message}")]
    GenerationError {
        /// The model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Shorthand for a [`RagError::Load`] error.
    pub fn load(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Load { path: path.into(), message: message.to_string() }
    }

    /// Shorthand for a [`RagError::VectorStoreError`] error.
    pub fn store(backend: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::VectorStoreError { backend: backend.into(), message: message.to_string() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
