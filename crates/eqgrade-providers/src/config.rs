//! Provider configuration and factories.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use eqgrade_core::engine::{EngineConfig, ModelClients};
use eqgrade_core::traits::{EmbeddingProvider, LlmProvider};

use crate::anthropic::AnthropicProvider;
use crate::gemini::{GeminiEmbedder, GeminiProvider};
use crate::ollama::{OllamaEmbedder, OllamaProvider};
use crate::onnx::Pooling;
use crate::openai::{OpenAiEmbedder, OpenAiProvider};

/// Configuration for a single model provider.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
    Gemini {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    /// Local encoders; each model lives in `<model_dir>/<model id>/`.
    Onnx {
        #[serde(default = "default_model_dir")]
        model_dir: PathBuf,
        #[serde(default)]
        pooling: Pooling,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Anthropic {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Ollama { base_url } => f
                .debug_struct("Ollama")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Gemini {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Gemini")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Onnx { model_dir, pooling } => f
                .debug_struct("Onnx")
                .field("model_dir", model_dir)
                .field("pooling", pooling)
                .finish(),
        }
    }
}

impl ProviderConfig {
    /// The `type` tag as written in the config file.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderConfig::OpenAI { .. } => "openai",
            ProviderConfig::Anthropic { .. } => "anthropic",
            ProviderConfig::Ollama { .. } => "ollama",
            ProviderConfig::Gemini { .. } => "gemini",
            ProviderConfig::Onnx { .. } => "onnx",
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("./models")
}

/// A model on a named provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

impl ModelRef {
    fn new(provider: &str, model: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
        }
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Embedding models for the equation matcher and the two similarity scorers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingModels {
    #[serde(default = "default_equation_model")]
    pub equation: ModelRef,
    #[serde(default = "default_sbert_model")]
    pub sbert: ModelRef,
    #[serde(default = "default_e5_model")]
    pub e5: ModelRef,
}

impl Default for EmbeddingModels {
    fn default() -> Self {
        Self {
            equation: default_equation_model(),
            sbert: default_sbert_model(),
            e5: default_e5_model(),
        }
    }
}

fn default_generation_model() -> ModelRef {
    ModelRef::new("gemini", "gemini-1.5-flash")
}
fn default_equation_model() -> ModelRef {
    ModelRef::new("gemini", "models/embedding-001")
}
fn default_sbert_model() -> ModelRef {
    ModelRef::new("local", "all-MiniLM-L6-v2")
}
/// E5 is read from the first token, so it gets its own `cls`-pooled entry.
fn default_e5_model() -> ModelRef {
    ModelRef::new("local-cls", "intfloat/e5-large-v2")
}

/// Top-level eqgrade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraderConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Model for equation extraction and feedback.
    #[serde(default = "default_generation_model")]
    pub generation: ModelRef,
    #[serde(default)]
    pub embeddings: EmbeddingModels,
    /// Generation temperature (0.0 for reproducible grading).
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Students graded concurrently within one analysis.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Directory of stored answer submissions.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_max_tokens() -> u32 {
    2048
}
fn default_parallelism() -> usize {
    1
}
fn default_storage_dir() -> PathBuf {
    PathBuf::from("./storage")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./eqgrade-results")
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            generation: default_generation_model(),
            embeddings: EmbeddingModels::default(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            parallelism: default_parallelism(),
            storage_dir: default_storage_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl GraderConfig {
    /// Look up a provider by name.
    pub fn provider(&self, name: &str) -> Result<&ProviderConfig> {
        self.providers.get(name).with_context(|| {
            let mut known: Vec<&str> = self.providers.keys().map(String::as_str).collect();
            known.sort_unstable();
            format!(
                "provider '{name}' is not configured (configured: {})",
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            )
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            generation_model: self.generation.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            parallelism: self.parallelism,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Resolve env vars in a provider config.
fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    let resolve_opt = |v: &Option<String>| v.as_deref().map(resolve_env_vars);
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
            org_id: resolve_opt(org_id),
        },
        ProviderConfig::Anthropic { api_key, base_url } => ProviderConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
        },
        ProviderConfig::Ollama { base_url } => ProviderConfig::Ollama {
            base_url: resolve_env_vars(base_url),
        },
        ProviderConfig::Gemini { api_key, base_url } => ProviderConfig::Gemini {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
        },
        ProviderConfig::Onnx { model_dir, pooling } => ProviderConfig::Onnx {
            model_dir: PathBuf::from(resolve_env_vars(&model_dir.to_string_lossy())),
            pooling: *pooling,
        },
    }
}

/// Inject API keys from `EQGRADE_*_KEY` variables, creating the provider
/// entry under its default name when missing.
fn apply_env_overrides(config: &mut GraderConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup("EQGRADE_OPENAI_KEY") {
        let entry = config
            .providers
            .entry("openai".into())
            .or_insert(ProviderConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
            });
        if let ProviderConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Some(key) = lookup("EQGRADE_ANTHROPIC_KEY") {
        let entry = config
            .providers
            .entry("anthropic".into())
            .or_insert(ProviderConfig::Anthropic {
                api_key: String::new(),
                base_url: None,
            });
        if let ProviderConfig::Anthropic { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Some(key) = lookup("EQGRADE_GEMINI_KEY") {
        let entry = config
            .providers
            .entry("gemini".into())
            .or_insert(ProviderConfig::Gemini {
                api_key: String::new(),
                base_url: None,
            });
        if let ProviderConfig::Gemini { api_key, .. } = entry {
            *api_key = key;
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `eqgrade.toml` in the current directory
/// 2. `~/.config/eqgrade/config.toml`
///
/// Environment variable overrides: `EQGRADE_OPENAI_KEY`, `EQGRADE_ANTHROPIC_KEY`,
/// `EQGRADE_GEMINI_KEY`.
pub fn load_config() -> Result<GraderConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<GraderConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("eqgrade.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match &config_path {
        Some(path) => parse_config_file(path)?,
        None => GraderConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();

    tracing::debug!(
        path = ?config_path,
        providers = config.providers.len(),
        "configuration loaded"
    );
    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<GraderConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str::<GraderConfig>(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("eqgrade"))
}

/// Create a text-generation provider from its configuration.
pub fn create_provider(name: &str, config: &ProviderConfig) -> Result<Box<dyn LlmProvider>> {
    match config {
        ProviderConfig::Anthropic { api_key, base_url } => {
            Ok(Box::new(AnthropicProvider::new(api_key, base_url.clone())))
        }
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => Ok(Box::new(OpenAiProvider::new(
            api_key,
            base_url.clone(),
            org_id.clone(),
        ))),
        ProviderConfig::Ollama { base_url } => Ok(Box::new(OllamaProvider::new(base_url))),
        ProviderConfig::Gemini { api_key, base_url } => {
            Ok(Box::new(GeminiProvider::new(api_key, base_url.clone())))
        }
        ProviderConfig::Onnx { .. } => {
            bail!("provider '{name}' (onnx) does not support text generation")
        }
    }
}

/// Create an embedder bound to `model` from its provider configuration.
pub fn create_embedder(
    name: &str,
    config: &ProviderConfig,
    model: &str,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => Ok(Box::new(OpenAiEmbedder::new(
            api_key,
            base_url.clone(),
            org_id.clone(),
            model,
        ))),
        ProviderConfig::Ollama { base_url } => Ok(Box::new(OllamaEmbedder::new(base_url, model))),
        ProviderConfig::Gemini { api_key, base_url } => Ok(Box::new(GeminiEmbedder::new(
            api_key,
            base_url.clone(),
            model,
        ))),
        ProviderConfig::Anthropic { .. } => {
            bail!("provider '{name}' (anthropic) does not support embeddings")
        }
        ProviderConfig::Onnx { model_dir, pooling } => {
            create_onnx_embedder(model_dir, model, *pooling)
        }
    }
}

#[cfg(feature = "onnx-embeddings")]
fn create_onnx_embedder(
    model_dir: &Path,
    model: &str,
    pooling: Pooling,
) -> Result<Box<dyn EmbeddingProvider>> {
    use crate::onnx::OnnxEmbedder;

    let dir = OnnxEmbedder::model_dir(model_dir, model);
    Ok(Box::new(OnnxEmbedder::load(&dir, model, pooling)?))
}

#[cfg(not(feature = "onnx-embeddings"))]
fn create_onnx_embedder(
    _model_dir: &Path,
    model: &str,
    _pooling: Pooling,
) -> Result<Box<dyn EmbeddingProvider>> {
    bail!("local model '{model}' requires building with the `onnx-embeddings` feature")
}

/// Build every model client the grading engine needs.
pub fn create_model_clients(config: &GraderConfig) -> Result<ModelClients> {
    let generation = &config.generation;
    let generator = create_provider(&generation.provider, config.provider(&generation.provider)?)
        .with_context(|| format!("generation model {generation}"))?;

    let embedder = |selection: &ModelRef| -> Result<Arc<dyn EmbeddingProvider>> {
        let provider = config.provider(&selection.provider)?;
        let embedder = create_embedder(&selection.provider, provider, &selection.model)
            .with_context(|| format!("embedding model {selection}"))?;
        Ok(Arc::from(embedder))
    };

    Ok(ModelClients {
        generator: Arc::from(generator),
        equation_embedder: embedder(&config.embeddings.equation)?,
        sbert_embedder: embedder(&config.embeddings.sbert)?,
        e5_embedder: embedder(&config.embeddings.e5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_EQGRADE_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_EQGRADE_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_EQGRADE_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("unterminated ${X"), "unterminated ${X");
        std::env::remove_var("_EQGRADE_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = GraderConfig::default();
        assert_eq!(config.generation, ModelRef::new("gemini", "gemini-1.5-flash"));
        assert_eq!(config.embeddings.equation.model, "models/embedding-001");
        assert_eq!(config.embeddings.sbert.model, "all-MiniLM-L6-v2");
        assert_eq!(config.embeddings.e5.model, "intfloat/e5-large-v2");
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.parallelism, 1);
    }

    #[test]
    fn parse_provider_config() {
        let toml_str = r#"
temperature = 0.2
parallelism = 4

[providers.gemini]
type = "gemini"
api_key = "g-test"

[providers.openai]
type = "openai"
api_key = "sk-openai"

[providers.ollama]
type = "ollama"

[providers.local]
type = "onnx"
model_dir = "/opt/models"
pooling = "cls"

[generation]
provider = "openai"
model = "gpt-4.1-mini"

[embeddings.sbert]
provider = "ollama"
model = "all-minilm"
"#;
        let config: GraderConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.providers.len(), 4);
        assert!(matches!(
            config.providers.get("local"),
            Some(ProviderConfig::Onnx {
                pooling: Pooling::Cls,
                ..
            })
        ));
        assert!(matches!(
            config.providers.get("ollama"),
            Some(ProviderConfig::Ollama { base_url }) if base_url == "http://localhost:11434"
        ));
        assert_eq!(config.generation.model, "gpt-4.1-mini");
        assert_eq!(config.embeddings.sbert.provider, "ollama");
        // untouched selections keep their defaults
        assert_eq!(config.embeddings.e5.model, "intfloat/e5-large-v2");
        assert_eq!(config.engine_config().parallelism, 4);
        assert_eq!(config.engine_config().temperature, 0.2);
    }

    #[test]
    fn default_e5_selection_uses_cls_pooling() {
        let toml_str = r#"
[providers.local]
type = "onnx"
model_dir = "./models"

[providers.local-cls]
type = "onnx"
model_dir = "./models"
pooling = "cls"
"#;
        let config: GraderConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.embeddings.e5.provider, "local-cls");
        assert!(matches!(
            config.provider(&config.embeddings.e5.provider).unwrap(),
            ProviderConfig::Onnx {
                pooling: Pooling::Cls,
                ..
            }
        ));
        assert!(matches!(
            config.provider(&config.embeddings.sbert.provider).unwrap(),
            ProviderConfig::Onnx {
                pooling: Pooling::Mean,
                ..
            }
        ));
    }

    #[test]
    fn debug_masks_api_keys() {
        let config = ProviderConfig::Gemini {
            api_key: "super-secret".into(),
            base_url: None,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn env_overrides_insert_and_replace_keys() {
        let mut config = GraderConfig::default();
        config.providers.insert(
            "openai".into(),
            ProviderConfig::OpenAI {
                api_key: "from-file".into(),
                base_url: Some("http://proxy".into()),
                org_id: None,
            },
        );

        apply_env_overrides(&mut config, |name| match name {
            "EQGRADE_OPENAI_KEY" => Some("from-env".into()),
            "EQGRADE_GEMINI_KEY" => Some("gemini-env".into()),
            _ => None,
        });

        assert!(matches!(
            config.providers.get("openai"),
            Some(ProviderConfig::OpenAI { api_key, base_url: Some(_), .. }) if api_key == "from-env"
        ));
        assert!(matches!(
            config.providers.get("gemini"),
            Some(ProviderConfig::Gemini { api_key, .. }) if api_key == "gemini-env"
        ));
        assert!(!config.providers.contains_key("anthropic"));
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eqgrade.toml");
        std::fs::write(
            &path,
            r#"
storage_dir = "/tmp/answers"

[providers.ollama]
type = "ollama"
base_url = "http://gpu-box:11434"
"#,
        )
        .unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/answers"));
        assert!(config.providers.contains_key("ollama"));

        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn unknown_provider_is_reported() {
        let config = GraderConfig::default();
        let err = config.provider("gemini").unwrap_err();
        assert!(err.to_string().contains("provider 'gemini' is not configured"));
    }

    #[test]
    fn factories_reject_unsupported_capabilities() {
        let anthropic = ProviderConfig::Anthropic {
            api_key: "k".into(),
            base_url: None,
        };
        assert!(create_provider("anthropic", &anthropic).is_ok());
        assert!(create_embedder("anthropic", &anthropic, "m").is_err());

        let onnx = ProviderConfig::Onnx {
            model_dir: PathBuf::from("/nonexistent"),
            pooling: Pooling::Mean,
        };
        assert!(create_provider("local", &onnx).is_err());
        assert!(create_embedder("local", &onnx, "all-MiniLM-L6-v2").is_err());
    }

    #[test]
    fn model_clients_from_config() {
        let mut config = GraderConfig::default();
        config.providers.insert(
            "gemini".into(),
            ProviderConfig::Gemini {
                api_key: "k".into(),
                base_url: None,
            },
        );
        for name in ["local", "local-cls"] {
            config.providers.insert(
                name.into(),
                ProviderConfig::Ollama {
                    base_url: default_ollama_url(),
                },
            );
        }

        let clients = create_model_clients(&config).unwrap();
        assert_eq!(clients.generator.name(), "gemini");
        assert_eq!(clients.equation_embedder.model(), "models/embedding-001");
        assert_eq!(clients.e5_embedder.model(), "intfloat/e5-large-v2");

        config.providers.remove("local");
        assert!(create_model_clients(&config).is_err());
    }
}
