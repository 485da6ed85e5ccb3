//! Source diversification on top of similarity search.
//!
//! Nearest-neighbour search over a corpus dominated by one large file tends
//! to return chunks from that file only. [`Diversifier`] widens the search
//! and, when every hit still comes from a single source, appends a few
//! random chunks from other sources so the answer can draw on them.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::RagConfig;
use crate::document::{Chunk, RetrievalResult};
use crate::error::Result;
use crate::index::EmbeddingIndex;

/// Upper bound on the widened search size.
pub const MAX_CANDIDATES: usize = 12;
/// Chunks drawn from other sources per augmentation.
pub const MAX_EXTRA_CHUNKS: usize = 3;
/// A single-source result must have more chunks than this to be augmented.
pub const AUGMENT_THRESHOLD: usize = 3;

/// Retrieves context for a question and spreads it across sources.
pub struct Diversifier {
    index: Arc<EmbeddingIndex>,
    top_k: usize,
    sample_limit: usize,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl Diversifier {
    /// Create a diversifier over `index` seeded from OS entropy.
    pub fn new(index: Arc<EmbeddingIndex>, config: &RagConfig) -> Self {
        Self {
            index,
            top_k: config.top_k,
            sample_limit: config.diversity_sample_limit,
            rng: Mutex::new(Box::new(StdRng::from_entropy())),
        }
    }

    /// Replace the random source, e.g. with a seeded [`StdRng`] in tests.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Mutex::new(Box::new(rng));
        self
    }

    /// Number of chunks requested from the index per question.
    pub fn search_size(&self) -> usize {
        (self.top_k * 2).min(MAX_CANDIDATES)
    }

    /// Search for `question` and diversify the result.
    ///
    /// Never fails: augmentation errors are logged and the base result is
    /// returned unchanged.
    pub async fn retrieve(&self, question: &str) -> RetrievalResult {
        let mut result = self.index.search(question, self.search_size()).await;
        info!(chunks = result.len(), sources = ?result.sources, "retrieved context");

        if result.sources.len() != 1 || result.len() <= AUGMENT_THRESHOLD {
            return result;
        }

        match self.pick_other_sources(&result).await {
            Ok(extra) if extra.is_empty() => debug!("no other sources available"),
            Ok(extra) => {
                info!(added = extra.len(), "added chunks from other sources");
                result.extend(extra);
            }
            Err(e) => warn!(error = %e, "diversification failed, keeping base result"),
        }
        result
    }

    async fn pick_other_sources(&self, base: &RetrievalResult) -> Result<Vec<Chunk>> {
        let pool = self.index.sample(self.sample_limit).await?;
        let present: HashSet<&str> = base.chunks.iter().map(|c| c.id.as_str()).collect();
        let candidates: Vec<&Chunk> = pool
            .iter()
            .filter(|c| !base.sources.iter().any(|s| s == c.source()))
            .filter(|c| !present.contains(c.id.as_str()))
            .collect();
        debug!(pool = pool.len(), candidates = candidates.len(), "scanned index for other sources");

        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(candidates.choose_multiple(&mut **rng, MAX_EXTRA_CHUNKS).map(|c| (*c).clone()).collect())
    }
}
