//! The `eqgrade list-models` command.

use std::path::{Path, PathBuf};

use anyhow::Result;

use eqgrade_core::traits::{ModelInfo, ModelKind};
use eqgrade_providers::config::{load_config_from, ProviderConfig};
use eqgrade_providers::create_provider;
use eqgrade_providers::ollama::OllamaProvider;

pub async fn execute(provider_filter: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let mut names: Vec<&String> = config.providers.keys().collect();
    names.sort();

    let mut found_any = false;

    for name in names {
        if let Some(filter) = &provider_filter {
            if name != filter {
                continue;
            }
        }

        let models = match &config.providers[name] {
            ProviderConfig::Ollama { base_url } => {
                match OllamaProvider::new(base_url).list_models_async().await {
                    Ok(models) => models,
                    Err(e) => {
                        tracing::warn!(provider = %name, "could not list models: {e:#}");
                        Vec::new()
                    }
                }
            }
            ProviderConfig::Onnx { model_dir, .. } => local_models(model_dir),
            other => create_provider(name, other)?.available_models(),
        };

        if !models.is_empty() {
            found_any = true;
            println!("Provider: {name}");
            for model in &models {
                println!("  {} — {} ({})", model.id, model.name, model.kind);
            }
            println!();
        }
    }

    if !found_any {
        println!("No providers configured. Run `eqgrade init` to create a config file.");
    }

    Ok(())
}

/// Model directories under `root` holding a `model.onnx`, one or two levels
/// deep (`all-MiniLM-L6-v2/` or `intfloat/e5-large-v2/`).
fn local_models(root: &Path) -> Vec<ModelInfo> {
    let mut found = Vec::new();
    collect_models(root, root, 2, &mut found);
    found.sort();

    found
        .into_iter()
        .map(|id| ModelInfo {
            name: id.clone(),
            id,
            provider: "onnx".into(),
            kind: ModelKind::Embedding,
        })
        .collect()
}

fn collect_models(root: &Path, dir: &Path, depth: usize, found: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if path.join("model.onnx").exists() {
            if let Ok(rel) = path.strip_prefix(root) {
                found.push(rel.to_string_lossy().replace('\\', "/"));
            }
        } else if depth > 1 {
            collect_models(root, &path, depth - 1, found);
        }
    }
}
