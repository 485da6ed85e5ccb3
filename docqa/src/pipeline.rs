//! Question answering pipeline orchestrator.
//!
//! The [`RagPipeline`] ties the [`EmbeddingIndex`], the [`Diversifier`] and
//! the [`AnswerSynthesizer`] together: ingestion goes straight to the index,
//! questions run validate → retrieve → generate → package.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa::{FileVectorStore, RagConfig, RagPipeline};
//!
//! let config = RagConfig::from_env()?;
//! let pipeline = RagPipeline::builder()
//!     .vector_store(Arc::new(FileVectorStore::open(&config.persist_dir).await?))
//!     .config(config)
//!     .embedding_provider(Arc::new(my_embedder))
//!     .language_model(Arc::new(my_model))
//!     .build()
//!     .await?;
//!
//! pipeline.reset_and_ingest(&["uploads/suppliers.csv", "uploads/notes.pdf"]).await?;
//! let answer = pipeline.answer("Which suppliers ship from Ohio?").await;
//! println!("{} ({:?})", answer.text, answer.sources);
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use rand::RngCore;
use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::diversify::Diversifier;
use crate::document::{Answer, AnswerOutcome, FileResult, IndexStatus, RetrievalStatus};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::EmbeddingIndex;
use crate::llm::LanguageModel;
use crate::loader::DocumentLoader;
use crate::synthesis::{AnswerSynthesizer, SynthesisStatus};
use crate::vectorstore::VectorStore;

/// Returned for a blank question.
pub const INVALID_QUESTION_ANSWER: &str = "Please provide a valid question.";

/// Returned when answering fails in an unexpected way.
pub const UNEXPECTED_ERROR_ANSWER: &str =
    "I'm sorry, but I encountered an unexpected error while processing your question.";

/// Longest question accepted by [`validate_question`], in characters.
pub const MAX_QUESTION_CHARS: usize = 1000;

/// Check a question against the accepted bounds (1..=1000 characters, not
/// blank) and return it trimmed.
///
/// [`RagPipeline::answer`] only rejects blank questions itself; transports
/// call this to apply the length bound before handing a question over.
///
/// # Errors
///
/// Returns [`RagError::InvalidQuestion`] if the question is blank or too long.
pub fn validate_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(RagError::InvalidQuestion("question must not be empty".to_string()));
    }
    let length = question.chars().count();
    if length > MAX_QUESTION_CHARS {
        return Err(RagError::InvalidQuestion(format!(
            "question is {length} characters, the limit is {MAX_QUESTION_CHARS}"
        )));
    }
    Ok(trimmed)
}

/// The question answering pipeline.
///
/// Construct one via [`RagPipeline::builder()`] and share it behind an
/// [`Arc`]; every method takes `&self`.
pub struct RagPipeline {
    config: RagConfig,
    index: Arc<EmbeddingIndex>,
    diversifier: Diversifier,
    synthesizer: AnswerSynthesizer,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return the underlying index.
    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    /// Add files to the index. See [`EmbeddingIndex::add`].
    pub async fn ingest<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<FileResult> {
        info!(files = paths.len(), "ingesting files");
        self.index.add(paths).await
    }

    /// Replace the index contents with `paths`. See
    /// [`EmbeddingIndex::reset_and_add`].
    ///
    /// # Errors
    ///
    /// Returns an error if the reset is aborted or the collection cannot be
    /// recreated.
    pub async fn reset_and_ingest<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<FileResult>> {
        info!(files = paths.len(), "replacing index contents");
        self.index.reset_and_add(paths).await
    }

    /// Index statistics. Never fails.
    pub async fn status(&self) -> IndexStatus {
        self.index.status().await
    }

    /// Alias of [`answer`](Self::answer).
    pub async fn query(&self, question: &str) -> Answer {
        self.answer(question).await
    }

    /// Answer `question` from the indexed documents.
    ///
    /// Never fails. Blank questions, empty indexes, backend errors, model
    /// errors and panics inside a component all produce an [`Answer`] whose
    /// [`outcome`](Answer::outcome) says what happened.
    pub async fn answer(&self, question: &str) -> Answer {
        let start = Instant::now();

        if question.trim().is_empty() {
            return Answer {
                text: INVALID_QUESTION_ANSWER.to_string(),
                sources: Vec::new(),
                processing_time: 0.0,
                documents_used: 0,
                outcome: AnswerOutcome::InvalidQuestion,
            };
        }

        info!(question, "answering question");
        let mut answer = match AssertUnwindSafe(self.answer_inner(question)).catch_unwind().await {
            Ok(answer) => answer,
            Err(panic) => {
                error!(panic = %panic_message(panic.as_ref()), "question answering failed");
                Answer {
                    text: UNEXPECTED_ERROR_ANSWER.to_string(),
                    sources: Vec::new(),
                    processing_time: 0.0,
                    documents_used: 0,
                    outcome: AnswerOutcome::Failed,
                }
            }
        };
        answer.processing_time = round_secs(start.elapsed().as_secs_f64());
        info!(
            outcome = ?answer.outcome,
            documents_used = answer.documents_used,
            processing_time = answer.processing_time,
            "answered question"
        );
        answer
    }

    async fn answer_inner(&self, question: &str) -> Answer {
        let retrieved = self.diversifier.retrieve(question).await;
        let synthesis = self.synthesizer.generate(question, &retrieved.chunks).await;

        let outcome = match (&retrieved.status, &synthesis.status) {
            (RetrievalStatus::Degraded { .. }, _) => AnswerOutcome::RetrievalDegraded,
            (_, SynthesisStatus::Generated) => AnswerOutcome::Answered,
            (_, SynthesisStatus::NoContext) => AnswerOutcome::NoContext,
            (_, SynthesisStatus::Fallback { .. }) => AnswerOutcome::GenerationFailed,
        };

        Answer {
            text: synthesis.text,
            documents_used: retrieved.chunks.len(),
            sources: retrieved.sources,
            processing_time: 0.0,
            outcome,
        }
    }
}

fn round_secs(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider`, `vector_store` and `language_model` are required.
/// The chunker defaults to a [`RecursiveChunker`] sized from the config, and
/// the config to [`RagConfig::default()`].
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(InMemoryVectorStore::new()))
///     .language_model(Arc::new(model))
///     .rng(StdRng::seed_from_u64(7))  // optional
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    language_model: Option<Arc<dyn LanguageModel>>,
    loader: Option<DocumentLoader>,
    rng: Option<Box<dyn RngCore + Send>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Override the default chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the language model used for answers.
    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.language_model = Some(model);
        self
    }

    /// Override the document loader.
    pub fn loader(mut self, loader: DocumentLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set the random source used for source diversification.
    pub fn rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Some(Box::new(rng));
        self
    }

    /// Open the index and build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if a required component is missing or the
    ///   chunk sizes are invalid.
    /// - [`RagError::PipelineError`] if the collection cannot be created.
    pub async fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let language_model = self
            .language_model
            .ok_or_else(|| RagError::ConfigError("language_model is required".to_string()))?;
        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::from_config(&config)?),
        };

        let mut index =
            EmbeddingIndex::open(&config, embedding_provider, vector_store, chunker).await?;
        if let Some(loader) = self.loader {
            index = index.with_loader(loader);
        }
        let index = Arc::new(index);

        let mut diversifier = Diversifier::new(Arc::clone(&index), &config);
        if let Some(rng) = self.rng {
            diversifier = diversifier.with_rng(rng);
        }
        let synthesizer = AnswerSynthesizer::from_config(language_model, &config);

        Ok(RagPipeline { config, index, diversifier, synthesizer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_question_bounds() {
        assert_eq!(validate_question("  where?  ").unwrap(), "where?");
        assert!(matches!(validate_question("   "), Err(RagError::InvalidQuestion(_))));
        assert!(validate_question(&"a".repeat(MAX_QUESTION_CHARS)).is_ok());
        assert!(matches!(
            validate_question(&"a".repeat(MAX_QUESTION_CHARS + 1)),
            Err(RagError::InvalidQuestion(_))
        ));
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round_secs(1.23456), 1.23);
        assert_eq!(round_secs(2.499), 2.5);
        assert_eq!(round_secs(0.0), 0.0);
    }
}
