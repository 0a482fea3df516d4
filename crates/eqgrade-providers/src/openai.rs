//! OpenAI API provider implementation.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use eqgrade_core::traits::{
    EmbeddingProvider, GenerateRequest, GenerateResponse, LlmProvider, ModelInfo, ModelKind,
    TokenUsage, DEFAULT_SYSTEM_PROMPT,
};

use crate::error::{check_status, parse_failure, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .expect("failed to build HTTP client")
}

/// OpenAI-compatible chat completions provider.
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    org_id: Option<String>,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, base_url: Option<String>, org_id: Option<String>) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            org_id,
            client: http_client(),
        }
    }

    fn post(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(format!("{}{endpoint}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json");
        if let Some(org) = &self.org_id {
            req = req.header("OpenAI-Organization", org);
        }
        req
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<OpenAiMessage>,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: OpenAiUsage,
    model: String,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let start = Instant::now();

        let system_prompt = request
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let body = OpenAiRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: system_prompt,
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: request.prompt.clone(),
                },
            ],
        };

        let response = self
            .post("/v1/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_send(e, DEFAULT_TIMEOUT_SECS))?;
        let response = check_status(response, &request.model).await?;

        let api_response: OpenAiResponse = response.json().await.map_err(parse_failure)?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(GenerateResponse {
            content,
            model: api_response.model,
            token_usage: TokenUsage {
                prompt_tokens: api_response.usage.prompt_tokens,
                completion_tokens: api_response.usage.completion_tokens,
                total_tokens: api_response.usage.total_tokens,
            },
            latency_ms,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        let model = |id: &str, name: &str, kind| ModelInfo {
            id: id.into(),
            name: name.into(),
            provider: "openai".into(),
            kind,
        };
        vec![
            model("gpt-4.1", "GPT-4.1", ModelKind::Generation),
            model("gpt-4.1-mini", "GPT-4.1 Mini", ModelKind::Generation),
            model(
                "text-embedding-3-small",
                "Text Embedding 3 Small",
                ModelKind::Embedding,
            ),
            model(
                "text-embedding-3-large",
                "Text Embedding 3 Large",
                ModelKind::Embedding,
            ),
        ]
    }
}

/// Embeddings through `/v1/embeddings`, bound to one model.
pub struct OpenAiEmbedder {
    inner: OpenAiProvider,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: &str,
        base_url: Option<String>,
        org_id: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            inner: OpenAiProvider::new(api_key, base_url, org_id),
            model: model.into(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, text), fields(model = %self.model, chars = text.len()))]
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .inner
            .post("/v1/embeddings")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_send(e, DEFAULT_TIMEOUT_SECS))?;
        let response = check_status(response, &self.model).await?;

        let api_response: EmbeddingResponse = response.json().await.map_err(parse_failure)?;
        let embedding = api_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::InvalidResponse("no embedding returned".into()))?;
        Ok(embedding)
    }
}
