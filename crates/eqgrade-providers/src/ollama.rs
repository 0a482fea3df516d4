//! Ollama (local model) provider implementation.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use eqgrade_core::traits::{
    EmbeddingProvider, GenerateRequest, GenerateResponse, LlmProvider, ModelInfo, ModelKind,
    TokenUsage, DEFAULT_SYSTEM_PROMPT,
};

use crate::error::{check_status, parse_failure, ProviderError};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_TIMEOUT_SECS: u64 = 300; // Local models are slower

/// Ollama local model provider.
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: &str) -> Self {
        let base = if base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            base_url: base.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_connect() {
            ProviderError::NetworkError(format!(
                "Ollama not reachable at {}. Is it running? Start with: ollama serve",
                self.base_url
            ))
        } else {
            ProviderError::from_send(e, DEFAULT_TIMEOUT_SECS)
        }
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
        model: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}{endpoint}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        check_status(response, model).await.map_err(|e| match e {
            ProviderError::ModelNotFound(model) => ProviderError::ModelNotFound(format!(
                "Model '{model}' not found locally. Pull it with: ollama pull {model}"
            )),
            other => other,
        })
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
    model: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModelEntry>,
}

#[derive(Deserialize)]
struct OllamaModelEntry {
    name: String,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let start = Instant::now();

        let system_prompt = request
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let body = OllamaRequest {
            model: request.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: system_prompt,
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: request.prompt.clone(),
                },
            ],
            stream: false,
            options: Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            }),
        };

        let response = self.post("/api/chat", &body, &request.model).await?;
        let api_response: OllamaResponse = response.json().await.map_err(parse_failure)?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let prompt_tokens = api_response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = api_response.eval_count.unwrap_or(0);

        Ok(GenerateResponse {
            content: api_response.message.content,
            model: api_response.model,
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            latency_ms,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        // Local models are only known at runtime; see `list_models_async`.
        vec![]
    }
}

impl OllamaProvider {
    /// Dynamically fetch available models from the Ollama instance.
    pub async fn list_models_async(&self) -> anyhow::Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        let response = check_status(response, "").await?;

        let tags: OllamaTagsResponse = response.json().await.map_err(parse_failure)?;

        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelInfo {
                kind: if m.name.contains("embed") || m.name.contains("minilm") {
                    ModelKind::Embedding
                } else {
                    ModelKind::Generation
                },
                id: m.name.clone(),
                name: m.name,
                provider: "ollama".into(),
            })
            .collect())
    }
}

/// Embeddings through Ollama's `/api/embed`, bound to one model.
pub struct OllamaEmbedder {
    inner: OllamaProvider,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: impl Into<String>) -> Self {
        Self {
            inner: OllamaProvider::new(base_url),
            model: model.into(),
        }
    }
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, text), fields(model = %self.model, chars = text.len()))]
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let body = OllamaEmbedRequest {
            model: &self.model,
            input: text,
        };
        let response = self.inner.post("/api/embed", &body, &self.model).await?;
        let api_response: OllamaEmbedResponse = response.json().await.map_err(parse_failure)?;

        let embedding = api_response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no embedding returned".into()))?;
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(model: &str) -> GenerateRequest {
        GenerateRequest {
            model: model.into(),
            prompt: "Extract all mathematical equations".into(),
            system_prompt: None,
            max_tokens: 512,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn successful_generation() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "message": {"role": "assistant", "content": "[]"},
            "model": "llama3.1:8b",
            "prompt_eval_count": 30,
            "eval_count": 15
        });

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "stream": false,
                "options": {"num_predict": 512}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(&server.uri());

        let response = provider.generate(&request("llama3.1:8b")).await.unwrap();
        assert_eq!(response.content, "[]");
        assert_eq!(response.token_usage.prompt_tokens, 30);
        assert_eq!(response.token_usage.total_tokens, 45);
    }

    #[tokio::test]
    async fn model_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(&server.uri());

        let err = provider.generate(&request("nonexistent")).await.unwrap_err();
        assert!(err.to_string().contains("ollama pull nonexistent"));
    }

    #[tokio::test]
    async fn dynamic_model_listing() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "models": [
                {"name": "llama3.1:8b", "size": 4_000_000_000_u64},
                {"name": "nomic-embed-text:latest", "size": 270_000_000_u64}
            ]
        });

        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(&server.uri());
        let models = provider.list_models_async().await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].id, "llama3.1:8b");
        assert_eq!(models[0].kind, ModelKind::Generation);
        assert_eq!(models[1].kind, ModelKind::Embedding);
    }

    #[tokio::test]
    async fn embedding_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(serde_json::json!({
                "model": "all-minilm",
                "input": "force equals mass times acceleration"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "all-minilm",
                "embeddings": [[0.5, -0.25, 1.0]]
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(&server.uri(), "all-minilm");

        let vector = embedder
            .embed("force equals mass times acceleration")
            .await
            .unwrap();
        assert_eq!(vector, vec![0.5, -0.25, 1.0]);
    }
}
