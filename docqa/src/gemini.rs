//! Gemini embeddings and text generation over the Generative Language REST API.
//!
//! This module is only available when the `gemini` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::{GenerationParams, LanguageModel};

const PROVIDER: &str = "Gemini";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 3072;
const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";

/// Embedding task hint sent with each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Text stored in the index.
    RetrievalDocument,
    /// A question searched against the index.
    RetrievalQuery,
    /// Symmetric similarity.
    SemanticSimilarity,
}

/// Shared client state for both Gemini endpoints.
#[derive(Clone)]
struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    fn new(api_key: String) -> std::result::Result<Self, String> {
        if api_key.trim().is_empty() {
            return Err("API key must not be empty".to_string());
        }
        Ok(Self { http: reqwest::Client::new(), base_url: GEMINI_BASE_URL.to_string(), api_key })
    }

    fn from_env() -> std::result::Result<Self, String> {
        let key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| "GEMINI_API_KEY environment variable not set".to_string())?;
        Self::new(key)
    }

    async fn call<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        model: &str,
        method: &str,
        body: &B,
    ) -> std::result::Result<R, String> {
        let response = self
            .http
            .post(format!("{}/models/{model}:{method}", self.base_url))
            .header("x-goog-api-key", &self.api_key)
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
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> Content<'a> {
    fn text(role: Option<&'a str>, text: &'a str) -> Self {
        Self { role, parts: [Part { text }] }
    }
}

/// An [`EmbeddingProvider`] backed by the Gemini embedding API.
///
/// Batches use [`TaskType::RetrievalDocument`] and single embeddings use
/// [`TaskType::RetrievalQuery`], matching how the index calls them.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::gemini::GeminiEmbeddingProvider;
///
/// let provider = GeminiEmbeddingProvider::from_env()?.with_output_dimensionality(768);
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct GeminiEmbeddingProvider {
    client: GeminiClient,
    model: String,
    document_task: TaskType,
    query_task: TaskType,
    output_dimensionality: Option<usize>,
    dimensions: usize,
}

impl GeminiEmbeddingProvider {
    /// Create a provider for `gemini-embedding-001`.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self::with_client(GeminiClient::new(api_key.into()).map_err(embedding_error)?))
    }

    /// Create a provider using the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Ok(Self::with_client(GeminiClient::from_env().map_err(embedding_error)?))
    }

    fn with_client(client: GeminiClient) -> Self {
        Self {
            client,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            document_task: TaskType::RetrievalDocument,
            query_task: TaskType::RetrievalQuery,
            output_dimensionality: None,
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Use one task type for both documents and queries.
    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.document_task = task_type;
        self.query_task = task_type;
        self
    }

    /// Truncate embeddings to `dims`.
    pub fn with_output_dimensionality(mut self, dims: usize) -> Self {
        self.output_dimensionality = Some(dims);
        self.dimensions = dims;
        self
    }

    /// Point at a different API root.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.client.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn request<'a>(&'a self, model: &'a str, text: &'a str, task: TaskType) -> EmbedRequest<'a> {
        EmbedRequest {
            model,
            content: Content::text(None, text),
            task_type: task,
            output_dimensionality: self.output_dimensionality,
        }
    }
}

fn embedding_error(message: String) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.into(), message }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");
        let qualified = format!("models/{}", self.model);
        let request = self.request(&qualified, text, self.query_task);
        let response: EmbedResponse =
            self.client.call(&self.model, "embedContent", &request).await.map_err(|message| {
                error!(provider = PROVIDER, error = %message, "embedding request failed");
                embedding_error(message)
            })?;
        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, batch_size = texts.len(), "embedding batch");

        let qualified = format!("models/{}", self.model);
        let request = BatchEmbedRequest {
            requests: texts.iter().map(|t| self.request(&qualified, t, self.document_task)).collect(),
        };
        let response: BatchEmbedResponse = self
            .client
            .call(&self.model, "batchEmbedContents", &request)
            .await
            .map_err(|message| {
                error!(provider = PROVIDER, error = %message, "batch embedding request failed");
                embedding_error(message)
            })?;

        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

/// A [`LanguageModel`] backed by Gemini `generateContent`.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::gemini::GeminiModel;
///
/// let model = GeminiModel::from_env()?;
/// let text = model.generate("Say hi", &GenerationParams::default()).await?;
/// ```
pub struct GeminiModel {
    client: GeminiClient,
    model: String,
}

impl GeminiModel {
    /// Create a client for `gemini-2.5-flash`.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = GeminiClient::new(api_key.into()).map_err(generation_error(DEFAULT_CHAT_MODEL))?;
        Ok(Self { client, model: DEFAULT_CHAT_MODEL.to_string() })
    }

    /// Create a client using the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let client = GeminiClient::from_env().map_err(generation_error(DEFAULT_CHAT_MODEL))?;
        Ok(Self { client, model: DEFAULT_CHAT_MODEL.to_string() })
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at a different API root.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.client.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

fn generation_error(model: &str) -> impl Fn(String) -> RagError + '_ {
    move |message| RagError::GenerationError { model: model.to_string(), message }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl LanguageModel for GeminiModel {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "generating");

        let request = GenerateRequest {
            contents: [Content::text(Some("user"), prompt)],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_output_tokens,
            },
        };
        let response: GenerateResponse = self
            .client
            .call(&self.model, "generateContent", &request)
            .await
            .map_err(generation_error(&self.model))?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(generation_error(&self.model)("response contained no text".to_string()));
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
