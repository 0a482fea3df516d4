//! Mock providers for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use eqgrade_core::traits::{
    EmbeddingProvider, GenerateRequest, GenerateResponse, LlmProvider, ModelInfo, ModelKind,
    TokenUsage,
};

/// A mock text-generation provider for exercising the pipeline without real
/// API calls.
///
/// Responses are chosen by prompt substring; rules are tried in insertion
/// order, so put more specific needles first.
pub struct MockProvider {
    /// Prompt substring → response.
    responses: Vec<(String, String)>,
    /// Response if no rule matches.
    default_response: String,
    call_count: AtomicU32,
    last_request: Mutex<Option<GenerateRequest>>,
}

impl MockProvider {
    /// Create a mock with the given prompt→response rules.
    pub fn new<K, V>(responses: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            responses: responses
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            default_response: "[]".to_string(),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn with_fixed_response(response: &str) -> Self {
        Self::new(Vec::<(String, String)>::new()).with_default(response)
    }

    /// Replace the fallback response.
    pub fn with_default(mut self, response: &str) -> Self {
        self.default_response = response.to_string();
        self
    }

    /// Number of calls made to this provider.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// The last request made to this provider.
    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        let content = self
            .responses
            .iter()
            .find(|(key, _)| request.prompt.contains(key.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.default_response.clone());

        // rough estimate
        let prompt_tokens = (request.prompt.len() / 4) as u32;
        let completion_tokens = (content.len() / 4) as u32;

        Ok(GenerateResponse {
            content,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            latency_ms: 1,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-model".into(),
            name: "Mock Model".into(),
            provider: "mock".into(),
            kind: ModelKind::Generation,
        }]
    }
}

/// A mock embedder returning fixed vectors per text.
///
/// Texts without a registered vector get the default vector, or a
/// deterministic hash-derived unit vector when no default is set.
pub struct MockEmbedder {
    model: String,
    vectors: Vec<(String, Vec<f32>)>,
    default_vector: Option<Vec<f32>>,
    dimension: usize,
    call_count: AtomicU32,
}

impl MockEmbedder {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            vectors: Vec::new(),
            default_vector: None,
            dimension: 8,
            call_count: AtomicU32::new(0),
        }
    }

    /// Register the vector returned for an exact text.
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.push((text.to_string(), vector));
        self
    }

    /// Vector for texts without a registered vector.
    pub fn with_default(mut self, vector: Vec<f32>) -> Self {
        self.default_vector = Some(vector);
        self
    }

    /// Number of `embed` calls made.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        let vector = self
            .vectors
            .iter()
            .find(|(t, _)| t == text)
            .map(|(_, v)| v.clone())
            .or_else(|| self.default_vector.clone())
            .unwrap_or_else(|| deterministic_vector(text, self.dimension));
        Ok(vector)
    }
}

/// A unit vector derived from the text bytes.
fn deterministic_vector(text: &str, dim: usize) -> Vec<f32> {
    let bytes = text.as_bytes();
    let v = (0..dim)
        .map(|i| {
            let byte = bytes.get(i % bytes.len().max(1)).copied().unwrap_or(0);
            (byte as f32 + i as f32) / 255.0
        })
        .collect();
    eqgrade_core::similarity::l2_normalize(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            model: "mock".into(),
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens: 100,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn fixed_response() {
        let provider = MockProvider::with_fixed_response("[]");

        let response = provider.generate(&request("anything")).await.unwrap();
        assert_eq!(response.content, "[]");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.last_request().unwrap().prompt, "anything");
    }

    #[tokio::test]
    async fn prompt_matching_in_order() {
        let provider = MockProvider::new([
            ("Evaluation Context", "feedback"),
            ("F = ma", "extraction"),
        ]);

        let resp = provider
            .generate(&request("Evaluation Context: F = ma"))
            .await
            .unwrap();
        assert_eq!(resp.content, "feedback");

        let resp = provider.generate(&request("text F = ma")).await.unwrap();
        assert_eq!(resp.content, "extraction");

        let resp = provider.generate(&request("nothing")).await.unwrap();
        assert_eq!(resp.content, "[]");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn embedder_lookup_and_default() {
        let embedder = MockEmbedder::new("m")
            .with_vector("a", vec![1.0, 0.0])
            .with_default(vec![0.0, 1.0]);

        assert_eq!(embedder.embed("a").await.unwrap(), vec![1.0, 0.0]);
        assert_eq!(embedder.embed("b").await.unwrap(), vec![0.0, 1.0]);
        assert_eq!(embedder.call_count(), 2);
    }

    #[tokio::test]
    async fn deterministic_fallback() {
        let embedder = MockEmbedder::new("m");

        let v1 = embedder.embed("same text").await.unwrap();
        let v2 = embedder.embed("same text").await.unwrap();
        let v3 = embedder.embed("other").await.unwrap();
        assert_eq!(v1, v2);
        assert_ne!(v1, v3);

        let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
