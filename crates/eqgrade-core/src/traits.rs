//! Core trait definitions for the external capabilities the pipeline uses.
//!
//! Text generation and embeddings are implemented by the `eqgrade-providers`
//! crate; answer stores live in [`crate::store`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::StudentAnswer;

// ---------------------------------------------------------------------------
// Text generation
// ---------------------------------------------------------------------------

/// Trait for LLM backends that turn a prompt into text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g. "gemini").
    fn name(&self) -> &str;

    /// Generate a completion for a prompt.
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse>;

    /// List available models for this provider.
    fn available_models(&self) -> Vec<ModelInfo>;
}

/// Request to generate text from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model identifier (e.g. "gemini-1.5-flash").
    pub model: String,
    /// The main prompt.
    pub prompt: String,
    /// Optional system prompt override.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

/// Response from an LLM generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// The raw response content.
    pub content: String,
    /// Model that actually generated the response.
    pub model: String,
    /// Token usage.
    pub token_usage: TokenUsage,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

/// Token accounting for one generation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Information about an available model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Provider name.
    pub provider: String,
    /// What the model is used for.
    pub kind: ModelKind,
}

/// Capability a model provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Generation,
    Embedding,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Generation => write!(f, "generation"),
            ModelKind::Embedding => write!(f, "embedding"),
        }
    }
}

/// Default system prompt for generation providers.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a precise assistant for grading mathematics answers. Follow the output format in the prompt exactly and respond with JSON only.";

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

/// Trait for text-embedding backends. Each instance is bound to one model.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Human-readable provider name (e.g. "openai").
    fn name(&self) -> &str;

    /// Model this embedder encodes with.
    fn model(&self) -> &str;

    /// Encode one text into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

// ---------------------------------------------------------------------------
// Answer store
// ---------------------------------------------------------------------------

/// Source of master and student answers.
#[async_trait]
pub trait AnswerStore: Send + Sync {
    /// The master answer for a question, if one exists.
    async fn master_answer(&self, question_id: &str) -> anyhow::Result<Option<String>>;

    /// All answers a user submitted for a question, in storage order.
    async fn student_answers(
        &self,
        question_id: &str,
        user_id: &str,
    ) -> anyhow::Result<Vec<StudentAnswer>>;
}

// ---------------------------------------------------------------------------
// Response cleanup
// ---------------------------------------------------------------------------

/// Strip incidental code-fence markers around an LLM JSON payload.
///
/// Trims, drops a leading "```json" and a trailing "```", then any remaining
/// surrounding backticks.
pub fn strip_code_fences(output: &str) -> &str {
    let s = output.trim();
    let s = s.strip_prefix("```json").unwrap_or(s);
    let s = s.strip_suffix("```").unwrap_or(s);
    s.trim_matches('`').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_json_fence() {
        let input = "```json\n[{\"equation\": \"x=1\"}]\n```";
        assert_eq!(strip_code_fences(input), "[{\"equation\": \"x=1\"}]");
    }

    #[test]
    fn strip_bare_fence() {
        let input = "```\n[]\n```";
        assert_eq!(strip_code_fences(input), "[]");
    }

    #[test]
    fn strip_leaves_plain_payload() {
        assert_eq!(strip_code_fences("  [1, 2]  "), "[1, 2]");
    }

    #[test]
    fn strip_inline_backticks() {
        assert_eq!(strip_code_fences("`{}`"), "{}");
    }

    #[test]
    fn strip_whitespace_only() {
        assert_eq!(strip_code_fences(" \n\t "), "");
    }
}
