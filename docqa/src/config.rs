//! Configuration for ingestion, indexing, retrieval and generation.
//!
//! A [`RagConfig`] is plain data. Build one with [`RagConfig::builder()`] to
//! get validation, or with [`RagConfig::from_env()`] to read the same
//! variables the service deployment uses:
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `CHUNK_SIZE` | `chunk_size` | 500 |
//! | `CHUNK_OVERLAP` | `chunk_overlap` | 50 |
//! | `SIMILARITY_TOP_K` | `top_k` | 4 |
//! | `CHROMA_PERSIST_DIR` | `persist_dir` | `./chroma_db` |
//! | `COLLECTION_NAME` | `collection` | `rag_collection` |
//! | `EMBED_BATCH_SIZE` | `batch_size` | 100 |
//! | `BATCH_PAUSE_MS` | `batch_pause` | 100 ms |
//! | `LOG_LEVEL` | `log_level` | `info` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// What to do when deleting the collection fails during a reset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Log a warning and ingest into the stale collection.
    #[default]
    ProceedStale,
    /// Return the deletion error without ingesting anything.
    Abort,
}

/// Configuration parameters for the document QA pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Maximum number of characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Configured number of results; the diversifier searches with `min(12, 2 * top_k)`.
    pub top_k: usize,
    /// Name of the collection holding the index.
    pub collection: String,
    /// Directory used by the persistent vector store.
    pub persist_dir: PathBuf,
    /// Number of chunks embedded and inserted per batch.
    pub batch_size: usize,
    /// Pause between consecutive batches.
    #[serde(with = "duration_ms")]
    pub batch_pause: Duration,
    /// Behavior when the collection cannot be deleted during a reset.
    pub reset_policy: ResetPolicy,
    /// Upper bound on entries scanned when diversifying a single-source result.
    pub diversity_sample_limit: usize,
    /// Sampling temperature passed to the language model.
    pub temperature: f32,
    /// Maximum number of tokens the language model may produce.
    pub max_output_tokens: u32,
    /// Default tracing filter used by [`crate::logging::init`].
    pub log_level: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 4,
            collection: "rag_collection".to_string(),
            persist_dir: PathBuf::from("./chroma_db"),
            batch_size: 100,
            batch_pause: Duration::from_millis(100),
            reset_policy: ResetPolicy::ProceedStale,
            diversity_sample_limit: 10_000,
            temperature: 0.1,
            max_output_tokens: 1500,
            log_level: "info".to_string(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is read first if present.
    /// Unset variables keep their defaults; malformed values are errors.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(RagError::ConfigError(format!("failed to read .env: {e}")));
            }
        }

        let mut builder = Self::builder();
        if let Some(v) = env_parse::<usize>("CHUNK_SIZE")? {
            builder = builder.chunk_size(v);
        }
        if let Some(v) = env_parse::<usize>("CHUNK_OVERLAP")? {
            builder = builder.chunk_overlap(v);
        }
        if let Some(v) = env_parse::<usize>("SIMILARITY_TOP_K")? {
            builder = builder.top_k(v);
        }
        if let Some(v) = env_parse::<usize>("EMBED_BATCH_SIZE")? {
            builder = builder.batch_size(v);
        }
        if let Some(v) = env_parse::<u64>("BATCH_PAUSE_MS")? {
            builder = builder.batch_pause(Duration::from_millis(v));
        }
        if let Ok(dir) = std::env::var("CHROMA_PERSIST_DIR") {
            builder = builder.persist_dir(dir);
        }
        if let Ok(name) = std::env::var("COLLECTION_NAME") {
            builder = builder.collection(name);
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            builder = builder.log_level(level);
        }
        builder.build()
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| RagError::ConfigError(format!("{key}={raw:?} is invalid: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the configured number of search results.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the persist directory.
    pub fn persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.persist_dir = dir.into();
        self
    }

    /// Set the number of chunks per embedding batch.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the pause between batches. Use `Duration::ZERO` in tests.
    pub fn batch_pause(mut self, pause: Duration) -> Self {
        self.config.batch_pause = pause;
        self
    }

    /// Set the reset policy.
    pub fn reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.config.reset_policy = policy;
        self
    }

    /// Set the maximum number of entries scanned by the diversifier.
    pub fn diversity_sample_limit(mut self, limit: usize) -> Self {
        self.config.diversity_sample_limit = limit;
        self
    }

    /// Set the model temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the maximum number of output tokens.
    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.config.max_output_tokens = tokens;
        self
    }

    /// Set the default log filter.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0` or `batch_size == 0`
    /// - `collection` is blank
    /// - `temperature` is outside `0.0..=2.0`
    pub fn build(self) -> Result<RagConfig> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if c.batch_size == 0 {
            return Err(RagError::ConfigError("batch_size must be greater than zero".to_string()));
        }
        if c.collection.trim().is_empty() {
            return Err(RagError::ConfigError("collection name must not be blank".to_string()));
        }
        if !(0.0..=2.0).contains(&c.temperature) {
            return Err(RagError::ConfigError(format!(
                "temperature ({}) must be within 0.0..=2.0",
                c.temperature
            )));
        }
        Ok(self.config)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_settings() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.collection, "rag_collection");
        assert_eq!(config.reset_policy, ResetPolicy::ProceedStale);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn zero_top_k_rejected() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
    }

    #[test]
    fn blank_collection_rejected() {
        assert!(RagConfig::builder().collection("  ").build().is_err());
    }

    #[test]
    fn serializes_pause_as_millis() {
        let config = RagConfig::builder().batch_pause(Duration::from_millis(250)).build().unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["batch_pause"], 250);
        let back: RagConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn env_values_are_parsed_or_rejected() {
        // SAFETY: these variable names are only touched by this test.
        unsafe {
            std::env::set_var("DOCQA_TEST_GOOD_SIZE", " 800 ");
            std::env::set_var("DOCQA_TEST_BAD_SIZE", "eight hundred");
        }

        assert_eq!(env_parse::<usize>("DOCQA_TEST_GOOD_SIZE").unwrap(), Some(800));
        assert_eq!(env_parse::<usize>("DOCQA_TEST_UNSET_SIZE").unwrap(), None);
        assert!(matches!(
            env_parse::<usize>("DOCQA_TEST_BAD_SIZE"),
            Err(RagError::ConfigError(_))
        ));
    }
}
