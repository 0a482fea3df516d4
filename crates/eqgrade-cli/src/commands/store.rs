//! The `eqgrade store` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use eqgrade_core::model::AnswerSubmission;
use eqgrade_core::store::FileAnswerStore;
use eqgrade_providers::config::load_config_from;

pub fn execute(
    payload_path: PathBuf,
    storage_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let content = std::fs::read_to_string(&payload_path)
        .with_context(|| format!("failed to read payload: {}", payload_path.display()))?;
    let submission: AnswerSubmission = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse payload: {}", payload_path.display()))?;

    let store = FileAnswerStore::new(storage_dir.unwrap_or(config.storage_dir));
    let path = store.save(&submission)?;

    println!(
        "Stored question {} ({} student answers) at {}",
        submission.question_id,
        submission.student_answers.len(),
        path.display()
    );

    Ok(())
}
