//! OpenAI embeddings and chat completions over `reqwest`.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::{GenerationParams, LanguageModel};

const PROVIDER: &str = "OpenAI";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

fn api_key_from_env() -> std::result::Result<String, String> {
    std::env::var("OPENAI_API_KEY").map_err(|_| "OPENAI_API_KEY environment variable not set".to_string())
}

fn check_key(api_key: &str) -> std::result::Result<(), String> {
    if api_key.trim().is_empty() { Err("API key must not be empty".to_string()) } else { Ok(()) }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// POST `body` to `{base_url}/{path}` and decode the JSON reply.
async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    api_key: &str,
    body: &B,
) -> std::result::Result<R, String> {
    let response = client
        .post(format!("{base_url}/{path}"))
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail =
            serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
        return Err(format!("API returned {status}: {detail}"));
    }

    response.json().await.map_err(|e| format!("failed to parse response: {e}"))
}

/// An [`EmbeddingProvider`] backed by the OpenAI `/v1/embeddings` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env()?.with_model("text-embedding-3-large");
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider for `text-embedding-3-small` (1536 dimensions).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_key(&api_key).map_err(embedding_error)?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: OPENAI_BASE_URL.to_string(),
            api_key,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env().map_err(embedding_error)?)
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Ask the API to truncate embeddings to `dims`.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Point at an OpenAI-compatible server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

fn embedding_error(message: String) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.into(), message }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| embedding_error("API returned empty response".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request =
            EmbeddingRequest { model: &self.model, input: texts, dimensions: self.request_dimensions };
        let mut response: EmbeddingResponse =
            post_json(&self.client, &self.base_url, "embeddings", &self.api_key, &request)
                .await
                .map_err(|message| {
                    error!(provider = PROVIDER, error = %message, "embedding request failed");
                    embedding_error(message)
                })?;

        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

/// A [`LanguageModel`] backed by the OpenAI `/v1/chat/completions` endpoint.
///
/// The prompt is sent as a single user message.
pub struct OpenAIChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAIChatModel {
    /// Create a model client for `gpt-4o-mini`.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_key(&api_key).map_err(|message| RagError::GenerationError {
            model: DEFAULT_CHAT_MODEL.into(),
            message,
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: OPENAI_BASE_URL.to_string(),
            api_key,
            model: DEFAULT_CHAT_MODEL.to_string(),
        })
    }

    /// Create a model client using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let key = api_key_from_env().map_err(|message| RagError::GenerationError {
            model: DEFAULT_CHAT_MODEL.into(),
            message,
        })?;
        Self::new(key)
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at an OpenAI-compatible server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "chat completion");

        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            temperature: params.temperature,
            max_tokens: params.max_output_tokens,
        };
        let generation_error = |message: String| RagError::GenerationError {
            model: self.model.clone(),
            message,
        };

        let response: ChatResponse =
            post_json(&self.client, &self.base_url, "chat/completions", &self.api_key, &request)
                .await
                .map_err(generation_error)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| generation_error("response contained no message content".to_string()))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_request_omits_unset_dimensions() {
        let texts = ["a", "b"];
        let request = EmbeddingRequest { model: "m", input: &texts, dimensions: None };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["input"], serde_json::json!(["a", "b"]));
        assert!(json.get("dimensions").is_none());
    }

    #[test]
    fn embeddings_are_reordered_by_index() {
        let mut response: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"index":1,"embedding":[2.0]},{"index":0,"embedding":[1.0]}]}"#,
        )
        .unwrap();
        response.data.sort_by_key(|d| d.index);

        assert_eq!(response.data[0].embedding, vec![1.0]);
    }

    #[test]
    fn blank_key_is_rejected() {
        assert!(OpenAIEmbeddingProvider::new("").is_err());
        assert!(OpenAIChatModel::new(" ").is_err());
    }
}
