//! Shared test doubles: a deterministic embedder, scripted language models and
//! a vector store with injectable failures.

#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docqa::{
    Chunk, EmbeddingProvider, GenerationParams, InMemoryVectorStore, LanguageModel, RagConfig,
    RagError, Result, SearchResult, VectorStore,
};

pub const DIM: usize = 64;

/// Bag-of-words embedder: each lowercase word hashes into one of [`DIM`]
/// buckets and the vector is L2-normalized. Texts sharing words land close.
#[derive(Default)]
pub struct HashEmbedder {
    pub embed_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    /// Fail every batch call with this 1-based index or later.
    pub fail_from_batch: Mutex<Option<usize>>,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_from_batch(batch: usize) -> Self {
        let embedder = Self::default();
        *embedder.fail_from_batch.lock().unwrap() = Some(batch);
        embedder
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() % DIM as u64) as usize] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        } else {
            v[0] = 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(from) = *self.fail_from_batch.lock().unwrap() {
            if call >= from {
                return Err(RagError::EmbeddingError {
                    provider: "hash".into(),
                    message: format!("batch {call} rejected"),
                });
            }
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Language model that records prompts and replies with a fixed text.
pub struct ScriptedModel {
    reply: String,
    pub prompts: Mutex<Vec<String>>,
    pub params: Mutex<Vec<GenerationParams>>,
}

impl ScriptedModel {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), prompts: Mutex::new(Vec::new()), params: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.params.lock().unwrap().push(*params);
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Language model whose every call fails.
#[derive(Default)]
pub struct FailingModel {
    pub calls: AtomicUsize,
}

#[async_trait]
impl LanguageModel for FailingModel {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::GenerationError { model: "failing".into(), message: "quota exceeded".into() })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Language model that panics, to exercise the orchestrator's containment.
pub struct PanickingModel;

#[async_trait]
impl LanguageModel for PanickingModel {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        panic!("model exploded");
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

/// In-memory store with switchable failures.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryVectorStore,
    pub fail_delete_collection: AtomicBool,
    pub fail_create_collection: AtomicBool,
    pub fail_reads: AtomicBool,
    pub fail_sample: AtomicBool,
    pub fail_flush: AtomicBool,
    pub upserts: AtomicUsize,
    pub flushes: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(RagError::store("Flaky", format!("{op} unavailable")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl VectorStore for FlakyStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        Self::check(&self.fail_create_collection, "create_collection")?;
        self.inner.create_collection(name, dimensions).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        Self::check(&self.fail_delete_collection, "delete_collection")?;
        self.inner.delete_collection(name).await
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(collection, chunks).await
    }

    async fn flush(&self, _collection: &str) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_flush, "flush")
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        self.inner.delete(collection, ids).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Self::check(&self.fail_reads, "count")?;
        self.inner.count(collection).await
    }

    async fn sample(&self, collection: &str, limit: usize) -> Result<Vec<Chunk>> {
        Self::check(&self.fail_sample, "sample")?;
        self.inner.sample(collection, limit).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        Self::check(&self.fail_reads, "search")?;
        self.inner.search(collection, embedding, top_k).await
    }

    fn location(&self) -> String {
        "flaky".to_string()
    }
}

/// Config with no batch pause so tests run fast.
pub fn test_config() -> RagConfig {
    RagConfig::builder().batch_pause(Duration::ZERO).build().unwrap()
}

/// Write `contents` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn arc<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
