//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] keeps every collection in a `HashMap` behind a
//! `tokio::sync::RwLock`. Nothing survives the process; use
//! [`FileVectorStore`](crate::FileVectorStore) for a persistent index.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorStore, rank};

const BACKEND: &str = "InMemory";

/// An in-memory vector store using cosine similarity for search.
///
/// Collections are stored as nested `HashMap`s: collection name → chunk ID → chunk.
/// Searches and counts share the read lock; writes take the write lock.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, HashMap<String, Chunk>>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All chunks of a collection, or `None` if it does not exist.
    pub(crate) async fn snapshot(&self, name: &str) -> Option<Vec<Chunk>> {
        let collections = self.collections.read().await;
        collections.get(name).map(|c| c.values().cloned().collect())
    }

    /// Whether a collection exists.
    pub(crate) async fn contains(&self, name: &str) -> bool {
        self.collections.read().await.contains_key(name)
    }

    /// Replace a collection wholesale.
    pub(crate) async fn restore(&self, name: &str, chunks: Vec<Chunk>) {
        let mut collections = self.collections.write().await;
        collections.insert(name.to_string(), chunks.into_iter().map(|c| (c.id.clone(), c)).collect());
    }
}

fn missing(collection: &str) -> RagError {
    RagError::store(BACKEND, format!("collection '{collection}' does not exist"))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, _dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        for chunk in chunks {
            if chunk.id.is_empty() {
                return Err(RagError::store(BACKEND, "chunk id must be set before upsert"));
            }
            store.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        for id in ids {
            store.remove(*id);
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections.get(collection).map(HashMap::len).ok_or_else(|| missing(collection))
    }

    async fn sample(&self, collection: &str, limit: usize) -> Result<Vec<Chunk>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(store.values().take(limit).cloned().collect())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(rank(store.values(), embedding, top_k))
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn contains_tracks_collection_lifecycle() {
        let store = InMemoryVectorStore::new();
        assert!(!store.contains("docs").await);

        store.create_collection("docs", 2).await.unwrap();
        assert!(store.contains("docs").await);

        store.delete_collection("docs").await.unwrap();
        assert!(!store.contains("docs").await);
    }
}
