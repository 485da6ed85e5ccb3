//! Persistent vector store backed by one JSON snapshot per collection.
//!
//! [`FileVectorStore`] serves reads from memory. Creating or deleting a
//! collection hits disk immediately; chunk upserts and deletes only mark the
//! collection dirty, and [`flush`](VectorStore::flush) rewrites its snapshot
//! once. Snapshots are written to a temporary file and renamed into place,
//! so a crash leaves either the old or the new snapshot, never a torn one.
//! Chunk ids are stored with the chunks and therefore survive restarts.
//!
//! ```text
//! <persist_dir>/
//!   rag_collection.json
//!   other_collection.json
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::inmemory::InMemoryVectorStore;
use crate::vectorstore::VectorStore;

const BACKEND: &str = "File";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    name: String,
    entries: Vec<Chunk>,
}

/// A [`VectorStore`] that persists collections under a directory.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::FileVectorStore;
///
/// let store = FileVectorStore::open("./chroma_db").await?;
/// store.create_collection("rag_collection", 768).await?;
/// ```
#[derive(Debug)]
pub struct FileVectorStore {
    root: PathBuf,
    memory: InMemoryVectorStore,
    // Collections with writes not yet on disk. Held across mutate + snapshot
    // so snapshots hit disk in mutation order.
    dirty: Mutex<HashSet<String>>,
}

impl FileVectorStore {
    /// Open (creating if needed) a store rooted at `root` and load every
    /// collection snapshot found there.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or read, or if a
    /// snapshot is unreadable. Both are fatal initialization failures.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        let memory = InMemoryVectorStore::new();
        let mut loaded = 0usize;
        let mut entries = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                RagError::store(BACKEND, format!("corrupt snapshot {}: {e}", path.display()))
            })?;
            if snapshot.version != SNAPSHOT_VERSION {
                return Err(RagError::store(
                    BACKEND,
                    format!("unsupported snapshot version {} in {}", snapshot.version, path.display()),
                ));
            }
            debug!(collection = %snapshot.name, entries = snapshot.entries.len(), "loaded snapshot");
            memory.restore(&snapshot.name, snapshot.entries).await;
            loaded += 1;
        }

        info!(root = %root.display(), collections = loaded, "opened file vector store");
        Ok(Self { root, memory, dirty: Mutex::new(HashSet::new()) })
    }

    /// The directory holding the snapshots.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(RagError::store(
                BACKEND,
                format!("collection name '{name}' must be ASCII letters, digits, '_' or '-'"),
            ));
        }
        Ok(self.root.join(format!("{name}.json")))
    }

    async fn persist(&self, name: &str) -> Result<()> {
        let path = self.snapshot_path(name)?;
        let Some(entries) = self.memory.snapshot(name).await else {
            return Ok(());
        };
        let snapshot = Snapshot { version: SNAPSHOT_VERSION, name: name.to_string(), entries };
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| RagError::store(BACKEND, format!("failed to encode '{name}': {e}")))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(collection = name, bytes = bytes.len(), "persisted snapshot");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for FileVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.snapshot_path(name)?;
        let _dirty = self.dirty.lock().await;
        if self.memory.contains(name).await {
            return Ok(());
        }
        self.memory.create_collection(name, dimensions).await?;
        self.persist(name).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let path = self.snapshot_path(name)?;
        let mut dirty = self.dirty.lock().await;
        // Snapshot first; memory is dropped only once it is gone.
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(RagError::store(
                    BACKEND,
                    format!("failed to remove snapshot {}: {e}", path.display()),
                ));
            }
        }
        dirty.remove(name);
        self.memory.delete_collection(name).await
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        self.snapshot_path(collection)?;
        let mut dirty = self.dirty.lock().await;
        self.memory.upsert(collection, chunks).await?;
        dirty.insert(collection.to_string());
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        self.snapshot_path(collection)?;
        let mut dirty = self.dirty.lock().await;
        self.memory.delete(collection, ids).await?;
        dirty.insert(collection.to_string());
        Ok(())
    }

    async fn flush(&self, collection: &str) -> Result<()> {
        let mut dirty = self.dirty.lock().await;
        if !dirty.contains(collection) {
            return Ok(());
        }
        self.persist(collection).await?;
        dirty.remove(collection);
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.memory.count(collection).await
    }

    async fn sample(&self, collection: &str, limit: usize) -> Result<Vec<Chunk>> {
        self.memory.sample(collection, limit).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.memory.search(collection, embedding, top_k).await
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
