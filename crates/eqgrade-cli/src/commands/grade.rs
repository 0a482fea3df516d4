//! The `eqgrade grade` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use eqgrade_core::engine::GradingEngine;
use eqgrade_providers::config::load_config_from;
use eqgrade_providers::create_model_clients;

pub async fn execute(
    master_path: PathBuf,
    student_path: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let master = std::fs::read_to_string(&master_path)
        .with_context(|| format!("failed to read master answer: {}", master_path.display()))?;
    let student = std::fs::read_to_string(&student_path)
        .with_context(|| format!("failed to read student answer: {}", student_path.display()))?;
    anyhow::ensure!(!master.trim().is_empty(), "master answer is empty");

    let config = load_config_from(config_path.as_deref())?;
    let clients = create_model_clients(&config)?;
    let engine = GradingEngine::new(clients, config.engine_config());

    let grade = engine.grade(&master, &student).await?;
    println!("{}", serde_json::to_string_pretty(&grade)?);

    Ok(())
}
