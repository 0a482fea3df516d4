//! Google Gemini API provider implementation.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use eqgrade_core::traits::{
    EmbeddingProvider, GenerateRequest, GenerateResponse, LlmProvider, ModelInfo, ModelKind,
    TokenUsage, DEFAULT_SYSTEM_PROMPT,
};

use crate::error::{check_status, parse_failure, ProviderError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: &str, base_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            client,
        }
    }

    async fn call<T: Serialize + ?Sized>(
        &self,
        model: &str,
        method: &str,
        body: &T,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!(
                "{}/v1beta/{}:{method}",
                self.base_url,
                model_path(model)
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::from_send(e, DEFAULT_TIMEOUT_SECS))?;
        check_status(response, model).await
    }
}

/// Resource path of a model; accepts both `gemini-1.5-flash` and
/// `models/gemini-1.5-flash`.
fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    system_instruction: GeminiContent,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

impl GeminiContent {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![GeminiPart {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: GeminiUsage,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let start = Instant::now();

        let system_prompt = request
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);

        let body = GeminiRequest {
            contents: vec![GeminiContent::text(Some("user"), &request.prompt)],
            system_instruction: GeminiContent::text(None, system_prompt),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        let response = self
            .call(&request.model, "generateContent", &body)
            .await?;
        let api_response: GeminiResponse = response.json().await.map_err(parse_failure)?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let content: String = api_response
            .candidates
            .first()
            .map(|c| c.content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        let usage = &api_response.usage_metadata;
        Ok(GenerateResponse {
            content,
            model: api_response
                .model_version
                .unwrap_or_else(|| request.model.clone()),
            token_usage: TokenUsage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            },
            latency_ms,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "gemini-1.5-flash".into(),
                name: "Gemini 1.5 Flash".into(),
                provider: "gemini".into(),
                kind: ModelKind::Generation,
            },
            ModelInfo {
                id: "gemini-1.5-pro".into(),
                name: "Gemini 1.5 Pro".into(),
                provider: "gemini".into(),
                kind: ModelKind::Generation,
            },
            ModelInfo {
                id: "models/embedding-001".into(),
                name: "Embedding 001".into(),
                provider: "gemini".into(),
                kind: ModelKind::Embedding,
            },
        ]
    }
}

/// Gemini `embedContent` embeddings with the retrieval-query task type,
/// bound to one model.
pub struct GeminiEmbedder {
    inner: GeminiProvider,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(api_key: &str, base_url: Option<String>, model: impl Into<String>) -> Self {
        Self {
            inner: GeminiProvider::new(api_key, base_url),
            model: model.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    model: String,
    content: GeminiContent,
    task_type: &'static str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbedValues,
}

#[derive(Deserialize)]
struct EmbedValues {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, text), fields(model = %self.model, chars = text.len()))]
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let body = EmbedRequest {
            model: model_path(&self.model),
            content: GeminiContent::text(None, text),
            task_type: "RETRIEVAL_QUERY",
        };
        let response = self.inner.call(&self.model, "embedContent", &body).await?;
        let api_response: EmbedResponse = response.json().await.map_err(parse_failure)?;

        if api_response.embedding.values.is_empty() {
            return Err(ProviderError::InvalidResponse("empty embedding returned".into()).into());
        }
        Ok(api_response.embedding.values)
    }
}
