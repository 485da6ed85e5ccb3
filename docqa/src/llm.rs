//! Language model trait used by the answer synthesizer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { temperature: 0.1, max_output_tokens: 1500 }
    }
}

/// A text-in, text-out language model.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::{GenerationParams, LanguageModel};
///
/// let text = model.generate("Summarize: ...", &GenerationParams::default()).await?;
/// ```
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Model name used in logs and errors.
    fn name(&self) -> &str;
}
