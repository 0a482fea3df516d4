//! Anthropic API provider implementation.
//!
//! Generation only; Anthropic has no embeddings endpoint.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use eqgrade_core::traits::{
    GenerateRequest, GenerateResponse, LlmProvider, ModelInfo, ModelKind, TokenUsage,
    DEFAULT_SYSTEM_PROMPT,
};

use crate::error::{check_status, parse_failure, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Anthropic API provider.
pub struct AnthropicProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
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
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: AnthropicUsage,
    model: String,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Replace a raw JSON error body with Anthropic's error message.
fn unwrap_error_message(err: ProviderError) -> ProviderError {
    match err {
        ProviderError::ApiError { status, message } => {
            let message = serde_json::from_str::<AnthropicError>(&message)
                .map(|e| e.error.message)
                .unwrap_or(message);
            ProviderError::ApiError { status, message }
        }
        other => other,
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let start = Instant::now();

        let system_prompt = request
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let body = AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: Some(system_prompt),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_send(e, DEFAULT_TIMEOUT_SECS))?;
        let response = check_status(response, &request.model)
            .await
            .map_err(unwrap_error_message)?;

        let api_response: AnthropicResponse = response.json().await.map_err(parse_failure)?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let content: String = api_response
            .content
            .iter()
            .map(|c| c.text.as_str())
            .collect();

        let usage = &api_response.usage;
        Ok(GenerateResponse {
            content,
            model: api_response.model,
            token_usage: TokenUsage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
                total_tokens: usage.input_tokens + usage.output_tokens,
            },
            latency_ms,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "claude-sonnet-4-20250514".into(),
                name: "Claude Sonnet 4".into(),
                provider: "anthropic".into(),
                kind: ModelKind::Generation,
            },
            ModelInfo {
                id: "claude-haiku-4-5-20251001".into(),
                name: "Claude Haiku 4.5".into(),
                provider: "anthropic".into(),
                kind: ModelKind::Generation,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> GenerateRequest {
        GenerateRequest {
            model: "claude-sonnet-4-20250514".into(),
            prompt: "Extract all mathematical equations".into(),
            system_prompt: None,
            max_tokens: 1024,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn successful_generation() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "content": [
                {"type": "text", "text": "[{\"equation\": \"E = mc^2\", "},
                {"type": "text", "text": "\"description\": \"energy\"}]"}
            ],
            "model": "claude-sonnet-4-20250514",
            "usage": {"input_tokens": 50, "output_tokens": 20}
        });

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new("test-key", Some(server.uri()));

        let response = provider.generate(&request()).await.unwrap();
        assert_eq!(
            response.content,
            r#"[{"equation": "E = mc^2", "description": "energy"}]"#
        );
        assert_eq!(response.token_usage.prompt_tokens, 50);
        assert_eq!(response.token_usage.completion_tokens, 20);
        assert_eq!(response.token_usage.total_tokens, 70);
    }

    #[tokio::test]
    async fn authentication_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new("bad-key", Some(server.uri()));

        let err = provider.generate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("authentication"));
    }

    #[tokio::test]
    async fn rate_limiting() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new("test-key", Some(server.uri()));

        let err = provider.generate(&request()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::RateLimited {
                retry_after_ms: 7000
            })
        ));
    }

    #[tokio::test]
    async fn huge_retry_after_saturates() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(429).insert_header("retry-after", u64::MAX.to_string()),
            )
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new("test-key", Some(server.uri()));

        let err = provider.generate(&request()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::RateLimited {
                retry_after_ms: u64::MAX
            })
        ));
    }

    #[tokio::test]
    async fn error_body_message_is_extracted() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "type": "error",
                "error": {"type": "invalid_request_error", "message": "max_tokens too large"}
            })))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new("test-key", Some(server.uri()));

        let err = provider.generate(&request()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "API error (HTTP 400): max_tokens too large"
        );
    }
}
