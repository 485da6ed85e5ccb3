//! The embedding index: load → chunk → embed → store, plus search and status.
//!
//! [`EmbeddingIndex`] owns one named collection in a [`VectorStore`]. Writes
//! are batched across all files of a call; reads never fail, they report
//! failure through [`RetrievalStatus::Degraded`](crate::RetrievalStatus) and
//! [`Health::Error`] instead.
//!
//! Per-file status is only as reliable as the batch outcome: a failed batch
//! marks every file of the call as failed, including files whose chunks were
//! stored by earlier batches. Those chunks stay in the collection until the
//! next reset.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chunking::Chunker;
use crate::config::{RagConfig, ResetPolicy};
use crate::document::{
    Chunk, Document, FileResult, FileStatus, Health, IndexStatus, RetrievalResult,
};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::loader::{DocumentLoader, file_name_of};
use crate::vectorstore::VectorStore;

/// A persistent semantic index over one named collection.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use docqa::{EmbeddingIndex, FileVectorStore, RagConfig, RecursiveChunker};
///
/// let config = RagConfig::from_env()?;
/// let index = EmbeddingIndex::open(
///     &config,
///     Arc::new(embedder),
///     Arc::new(FileVectorStore::open(&config.persist_dir).await?),
///     Arc::new(RecursiveChunker::from_config(&config)?),
/// )
/// .await?;
/// let results = index.add(&["uploads/suppliers.csv"]).await;
/// ```
pub struct EmbeddingIndex {
    collection: String,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    loader: DocumentLoader,
    batch_size: usize,
    batch_pause: Duration,
    reset_policy: ResetPolicy,
    write_lock: Mutex<()>,
}

impl EmbeddingIndex {
    /// Open the index, creating its collection if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if the collection cannot be
    /// created. This is the fatal, backend-unreachable case.
    pub async fn open(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        chunker: Arc<dyn Chunker>,
    ) -> Result<Self> {
        let index = Self {
            collection: config.collection.clone(),
            embedder,
            store,
            chunker,
            loader: DocumentLoader::new(),
            batch_size: config.batch_size.max(1),
            batch_pause: config.batch_pause,
            reset_policy: config.reset_policy,
            write_lock: Mutex::new(()),
        };
        index.create_collection().await?;
        info!(
            collection = %index.collection,
            location = %index.store.location(),
            embedder = index.embedder.name(),
            "embedding index ready"
        );
        Ok(index)
    }

    /// Replace the document loader, e.g. to change the row cap.
    pub fn with_loader(mut self, loader: DocumentLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Name of the collection this index owns.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn create_collection(&self) -> Result<()> {
        self.store
            .create_collection(&self.collection, self.embedder.dimensions())
            .await
            .map_err(|e| {
                error!(collection = %self.collection, error = %e, "failed to create collection");
                RagError::PipelineError(format!(
                    "failed to create collection '{}': {e}",
                    self.collection
                ))
            })
    }

    /// Load, chunk and index `paths`, returning one result per path in order.
    pub async fn add<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<FileResult> {
        let _guard = self.write_lock.lock().await;
        self.add_locked(paths).await
    }

    /// Delete the collection, recreate it empty, then [`add`](Self::add) `paths`.
    ///
    /// # Errors
    ///
    /// - The deletion error, if deletion fails under [`ResetPolicy::Abort`].
    /// - [`RagError::PipelineError`] if the collection cannot be recreated.
    pub async fn reset_and_add<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<FileResult>> {
        let _guard = self.write_lock.lock().await;
        info!(collection = %self.collection, "resetting vector store");

        match self.store.delete_collection(&self.collection).await {
            Ok(()) => info!(collection = %self.collection, "cleared existing collection"),
            Err(e) => match self.reset_policy {
                ResetPolicy::ProceedStale => {
                    warn!(collection = %self.collection, error = %e, "failed to clear collection, continuing with stale contents")
                }
                ResetPolicy::Abort => {
                    error!(collection = %self.collection, error = %e, "failed to clear collection, aborting reset");
                    return Err(e);
                }
            },
        }

        self.create_collection().await?;
        Ok(self.add_locked(paths).await)
    }

    async fn add_locked<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<FileResult> {
        let mut results = Vec::with_capacity(paths.len());
        let mut pending: Vec<Chunk> = Vec::new();

        for path in paths {
            let path = path.as_ref();
            let filename = file_name_of(path);
            info!(path = %path.display(), "processing file");

            let documents = match self.load(path).await {
                Ok(documents) => documents,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to process file");
                    results.push(FileResult::failed(filename, e.to_string()));
                    continue;
                }
            };
            if documents.is_empty() {
                warn!(path = %path.display(), "no documents loaded");
                results.push(FileResult::failed(filename, "No documents loaded"));
                continue;
            }

            let chunks = self.chunker.split(&documents);
            info!(
                path = %path.display(),
                documents = documents.len(),
                chunks = chunks.len(),
                "processed file"
            );
            results.push(FileResult::success(filename, chunks.len()));
            pending.extend(chunks);
        }

        if pending.is_empty() {
            return results;
        }

        let inserted = self.insert_batches(pending).await;
        let flushed = self.store.flush(&self.collection).await;
        let outcome = match (inserted, flushed) {
            (Ok(inserted), Ok(())) => Ok(inserted),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), flushed) => {
                if let Err(flush_error) = flushed {
                    warn!(error = %flush_error, "failed to flush partial insert");
                }
                Err(e)
            }
        };

        match outcome {
            Ok(inserted) => {
                info!(chunks = inserted, "added chunks to vector store");
                match self.store.count(&self.collection).await {
                    Ok(count) => info!(document_count = count, "vector store updated"),
                    Err(e) => warn!(error = %e, "could not verify document count"),
                }
            }
            Err(e) => {
                error!(error = %e, "failed to add documents to vector store");
                let message = format!("Failed to add to vector store: {e}");
                for result in results.iter_mut().filter(|r| r.is_success()) {
                    result.status = FileStatus::Failed;
                    result.chunks_created = 0;
                    result.error = Some(message.clone());
                }
            }
        }

        results
    }

    async fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let loader = self.loader.clone();
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || loader.load(&owned))
            .await
            .map_err(|e| RagError::load(path.display().to_string(), e))?
    }

    /// Embed and upsert `chunks` in fixed-size batches, pausing between them.
    async fn insert_batches(&self, mut chunks: Vec<Chunk>) -> Result<usize> {
        for chunk in &mut chunks {
            chunk.id = Uuid::new_v4().to_string();
        }

        let total = chunks.len().div_ceil(self.batch_size);
        info!(chunks = chunks.len(), batches = total, "adding chunks to vector store");

        for (i, batch) in chunks.chunks_mut(self.batch_size).enumerate() {
            if i > 0 && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }

            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(RagError::EmbeddingError {
                    provider: self.embedder.name().to_string(),
                    message: format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        embeddings.len()
                    ),
                });
            }
            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }

            self.store.upsert(&self.collection, batch).await?;
            info!(batch = i + 1, total, "added batch");
        }

        Ok(chunks.len())
    }

    /// The `k` nearest chunks to `query`.
    ///
    /// An empty collection yields an empty result without embedding the
    /// query. Backend failures yield an empty, degraded result.
    pub async fn search(&self, query: &str, k: usize) -> RetrievalResult {
        info!(query, k, "performing similarity search");
        match self.try_search(query, k).await {
            Ok(result) => {
                info!(found = result.len(), "similarity search finished");
                result
            }
            Err(e) => {
                error!(error = %e, "similarity search failed");
                RetrievalResult::degraded(e.to_string())
            }
        }
    }

    async fn try_search(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        match self.store.count(&self.collection).await {
            Ok(0) => {
                warn!(collection = %self.collection, "vector store is empty, nothing to search");
                return Ok(RetrievalResult::empty());
            }
            Ok(count) => debug!(document_count = count, "searching collection"),
            Err(e) => warn!(error = %e, "could not check document count"),
        }

        let embedding = self.embedder.embed(query).await?;
        let hits = self.store.search(&self.collection, &embedding, k).await?;
        for (rank, hit) in hits.iter().enumerate() {
            debug!(
                rank = rank + 1,
                source = hit.chunk.source(),
                score = hit.score,
                preview = %preview(&hit.chunk.text),
                "search hit"
            );
        }
        Ok(RetrievalResult::from_chunks(hits.into_iter().map(|h| h.chunk).collect()))
    }

    /// Up to `limit` stored chunks, in no particular order.
    pub async fn sample(&self, limit: usize) -> Result<Vec<Chunk>> {
        self.store.sample(&self.collection, limit).await
    }

    /// Entry count and backend health. Never fails.
    pub async fn status(&self) -> IndexStatus {
        let persist_location = self.store.location();
        match self.store.count(&self.collection).await {
            Ok(document_count) => {
                IndexStatus { document_count, persist_location, status: Health::Healthy, error: None }
            }
            Err(e) => {
                error!(error = %e, "failed to get collection info");
                IndexStatus {
                    document_count: 0,
                    persist_location,
                    status: Health::Error,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(100).collect()
}
