//! eqgrade-providers: Model provider integrations.
//!
//! Implements the text-generation and embedding capabilities for OpenAI,
//! Anthropic, Ollama, Gemini and local ONNX encoders, plus the TOML
//! configuration that wires them into a grading engine.

pub mod anthropic;
pub mod config;
pub mod error;
pub mod gemini;
pub mod mock;
pub mod ollama;
pub mod onnx;
pub mod openai;

pub use config::{
    create_embedder, create_model_clients, create_provider, load_config, load_config_from,
    GraderConfig, ModelRef, ProviderConfig,
};
pub use error::ProviderError;
