//! Embedding provider trait for turning chunk text and questions into vectors.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// The index calls [`embed_batch`](EmbeddingProvider::embed_batch) once per
/// insert batch and [`embed`](EmbeddingProvider::embed) once per question.
/// The default batch implementation embeds sequentially; backends with a
/// native batch endpoint should override it.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("which suppliers ship bolts?").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Name used in logs and error messages.
    fn name(&self) -> &str {
        "embedding"
    }
}
