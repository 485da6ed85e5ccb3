//! Vector store trait for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// A storage backend for chunk embeddings with similarity search.
///
/// Implementations manage named collections of [`Chunk`]s keyed by
/// [`Chunk::id`]. Every chunk passed to [`upsert`](VectorStore::upsert) must
/// have its id and embedding set.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 384).await?;
/// store.upsert("docs", &chunks).await?;
/// let results = store.search("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its data. No-op if it does not exist.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert or replace chunks in a collection.
    ///
    /// Durable backends may buffer the write until [`flush`](VectorStore::flush).
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Delete chunks by their IDs from a collection.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// Number of chunks in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Up to `limit` chunks from a collection, in no particular order.
    async fn sample(&self, collection: &str, limit: usize) -> Result<Vec<Chunk>>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns results ordered by descending similarity score.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Make buffered writes to a collection durable.
    async fn flush(&self, _collection: &str) -> Result<()> {
        Ok(())
    }

    /// Where this store keeps its data, for status reporting.
    fn location(&self) -> String;
}

/// Cosine similarity of two vectors, 0.0 if either has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Score every chunk against `embedding` and keep the best `top_k`.
pub(crate) fn rank<'a>(
    chunks: impl Iterator<Item = &'a Chunk>,
    embedding: &[f32],
    top_k: usize,
) -> Vec<SearchResult> {
    let mut scored: Vec<(f32, &Chunk)> =
        chunks.map(|chunk| (cosine_similarity(&chunk.embedding, embedding), chunk)).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored.into_iter().map(|(score, chunk)| SearchResult { chunk: chunk.clone(), score }).collect()
}
