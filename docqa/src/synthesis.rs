//! Answer synthesis from multi-source context.
//!
//! [`AnswerSynthesizer`] groups retrieved chunks by source, renders one
//! context section per source and asks a [`LanguageModel`] for an answer that
//! draws on all of them. It never fails: an empty context and a model error
//! both map to fixed texts, tagged with a [`SynthesisStatus`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::RagConfig;
use crate::document::Chunk;
use crate::llm::{GenerationParams, LanguageModel};

/// Returned when no context was retrieved.
pub const NO_CONTEXT_ANSWER: &str = "I couldn't find relevant information in the knowledge base to answer your question. Please try rephrasing or ask about something else.";

/// Returned when the model call fails.
pub const GENERATION_FAILED_ANSWER: &str =
    "I apologize, but I encountered an error while generating the answer. Please try again later.";

/// Chunks rendered per source section.
pub const MAX_CHUNKS_PER_SOURCE: usize = 3;

const INSTRUCTIONS: &str = "INSTRUCTIONS:
1. Synthesize information from ALL relevant sources
2. If different sources have conflicting information, mention this
3. Provide a comprehensive answer that considers all available data
4. If you cannot find specific information, say so but still use what you have";

/// How a [`Synthesis`] was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SynthesisStatus {
    /// The model answered.
    Generated,
    /// There was no context; the model was not called.
    NoContext,
    /// The model call failed and the apology text was substituted.
    Fallback {
        /// The swallowed error.
        reason: String,
    },
}

/// Answer text plus how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    /// The answer text.
    pub text: String,
    /// Whether the text came from the model or a fixed fallback.
    pub status: SynthesisStatus,
}

/// Turns a question and retrieved chunks into an answer.
pub struct AnswerSynthesizer {
    model: Arc<dyn LanguageModel>,
    params: GenerationParams,
}

impl AnswerSynthesizer {
    /// Create a synthesizer with default generation parameters.
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model, params: GenerationParams::default() }
    }

    /// Create a synthesizer using the temperature and token limit in `config`.
    pub fn from_config(model: Arc<dyn LanguageModel>, config: &RagConfig) -> Self {
        Self {
            model,
            params: GenerationParams {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
            },
        }
    }

    /// Answer `question` from `chunks`.
    pub async fn generate(&self, question: &str, chunks: &[Chunk]) -> Synthesis {
        if chunks.is_empty() {
            return Synthesis { text: NO_CONTEXT_ANSWER.to_string(), status: SynthesisStatus::NoContext };
        }

        let prompt = build_prompt(question, chunks);
        match self.model.generate(&prompt, &self.params).await {
            Ok(text) => Synthesis { text: text.trim().to_string(), status: SynthesisStatus::Generated },
            Err(e) => {
                error!(model = self.model.name(), error = %e, "generation failed");
                Synthesis {
                    text: GENERATION_FAILED_ANSWER.to_string(),
                    status: SynthesisStatus::Fallback { reason: e.to_string() },
                }
            }
        }
    }
}

/// Render `chunks` as one `FROM {source}:` section per source, in first-seen
/// order, with at most [`MAX_CHUNKS_PER_SOURCE`] entries each.
pub fn render_context(chunks: &[Chunk]) -> String {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for chunk in chunks {
        match groups.iter_mut().find(|(source, _)| *source == chunk.source()) {
            Some((_, texts)) => texts.push(&chunk.text),
            None => groups.push((chunk.source(), vec![&chunk.text])),
        }
    }

    info!(
        sources = groups.len(),
        names = ?groups.iter().map(|(s, _)| *s).collect::<Vec<_>>(),
        "using context"
    );

    groups
        .iter()
        .map(|(source, texts)| {
            let lines: Vec<String> =
                texts.iter().take(MAX_CHUNKS_PER_SOURCE).map(|t| format!("- {t}")).collect();
            format!("FROM {source}:\n{}", lines.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The full prompt for `question` over `chunks`.
pub fn build_prompt(question: &str, chunks: &[Chunk]) -> String {
    let context = render_context(chunks);
    format!(
        "You are an assistant that answers questions about the documents in a knowledge base.\n\
         Use the following context from multiple sources to provide a comprehensive answer.\n\n\
         CONTEXT FROM VARIOUS SOURCES:\n{context}\n\n\
         QUESTION: {question}\n\n\
         {INSTRUCTIONS}\n\n\
         COMPREHENSIVE ANSWER:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentMetadata;

    fn chunk(source: &str, text: &str) -> Chunk {
        Chunk {
            id: format!("{source}-{text}"),
            text: text.to_string(),
            metadata: DocumentMetadata { source: source.to_string(), ..Default::default() },
            ordinal: 0,
            start: 0,
            end: text.chars().count(),
            embedding: Vec::new(),
        }
    }

    #[test]
    fn groups_by_source_in_first_seen_order() {
        let chunks = vec![chunk("b.txt", "one"), chunk("a.csv", "two"), chunk("b.txt", "three")];
        assert_eq!(render_context(&chunks), "FROM b.txt:\n- one\n- three\n\nFROM a.csv:\n- two");
    }

    #[test]
    fn caps_chunks_per_source() {
        let chunks: Vec<Chunk> = (0..5).map(|i| chunk("a.txt", &format!("c{i}"))).collect();
        let rendered = render_context(&chunks);
        assert_eq!(rendered.matches("\n- ").count(), MAX_CHUNKS_PER_SOURCE);
        assert!(!rendered.contains("c3"));
    }

    #[test]
    fn prompt_contains_question_and_context() {
        let prompt = build_prompt("who ships bolts?", &[chunk("s.csv", "Acme ships bolts")]);
        assert!(prompt.contains("QUESTION: who ships bolts?"));
        assert!(prompt.contains("FROM s.csv:\n- Acme ships bolts"));
        assert!(!prompt.contains("{context}"));
    }
}
