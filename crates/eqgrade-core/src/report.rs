//! Analysis outcomes and persisted grading reports.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AnalysisError;
use crate::model::QuestionAnalysis;

/// Top-level result of one analysis request.
///
/// Serializes either as the analysis itself or as `{ "error": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Completed(QuestionAnalysis),
    Failed { error: String },
}

impl AnalysisOutcome {
    pub fn failed(error: &AnalysisError) -> Self {
        Self::Failed {
            error: error.to_string(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

impl From<Result<QuestionAnalysis, AnalysisError>> for AnalysisOutcome {
    fn from(result: Result<QuestionAnalysis, AnalysisError>) -> Self {
        match result {
            Ok(analysis) => Self::Completed(analysis),
            Err(e) => Self::failed(&e),
        }
    }
}

/// A completed analysis with run metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// User whose answers were graded.
    pub user_id: String,
    /// Generation model used for extraction and feedback.
    pub generation_model: String,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
    pub analysis: QuestionAnalysis,
}

/// Aggregate view of the final scores in a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Answers that came back without parseable feedback.
    pub missing_feedback: usize,
}

impl GradingReport {
    pub fn new(
        analysis: QuestionAnalysis,
        user_id: impl Into<String>,
        generation_model: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            user_id: user_id.into(),
            generation_model: generation_model.into(),
            duration_ms,
            analysis,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: GradingReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Summarize final scores. `None` for an empty analysis.
    pub fn summary(&self) -> Option<ScoreSummary> {
        let results = &self.analysis.results;
        if results.is_empty() {
            return None;
        }

        let scores = results.iter().map(|r| r.final_score);
        let min = scores.clone().fold(f64::INFINITY, f64::min);
        let max = scores.clone().fold(f64::NEG_INFINITY, f64::max);
        let mean = scores.sum::<f64>() / results.len() as f64;

        Some(ScoreSummary {
            count: results.len(),
            mean,
            min,
            max,
            missing_feedback: results.iter().filter(|r| r.feedback.is_none()).count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotFoundError;
    use crate::model::{AnalysisResult, FeedbackPayload};

    fn result(student_id: &str, final_score: f64, with_feedback: bool) -> AnalysisResult {
        AnalysisResult {
            student_id: student_id.into(),
            final_score,
            feedback: with_feedback.then(|| FeedbackPayload {
                score_out_of_10: final_score,
                verdict: "Good".into(),
                comment: "ok".into(),
                advice: "more".into(),
            }),
        }
    }

    fn analysis(results: Vec<AnalysisResult>) -> QuestionAnalysis {
        QuestionAnalysis {
            question_id: "q1".into(),
            results,
        }
    }

    #[test]
    fn failed_outcome_serializes_as_error_object() {
        let outcome = AnalysisOutcome::failed(&AnalysisError::NotFound(
            NotFoundError::MasterAnswer {
                question_id: "q9".into(),
            },
        ));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 1);
        assert!(json["error"].as_str().unwrap().contains("q9"));
        assert!(!outcome.is_completed());
    }

    #[test]
    fn completed_outcome_serializes_as_analysis() {
        let outcome: AnalysisOutcome =
            Ok::<_, AnalysisError>(analysis(vec![result("alice", 7.5, true)])).into();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["questionId"], "q1");
        assert_eq!(json["results"][0]["final_score"], 7.5);
        assert!(outcome.is_completed());
    }

    #[test]
    fn summary_over_results() {
        let report = GradingReport::new(
            analysis(vec![
                result("alice", 4.0, true),
                result("alice", 8.0, false),
                result("alice", 6.0, true),
            ]),
            "alice",
            "m",
            12,
        );
        let summary = report.summary().unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.mean, 6.0);
        assert_eq!(summary.min, 4.0);
        assert_eq!(summary.max, 8.0);
        assert_eq!(summary.missing_feedback, 1);

        let empty = GradingReport::new(analysis(vec![]), "alice", "m", 0);
        assert!(empty.summary().is_none());
    }

    #[test]
    fn json_roundtrip() {
        let report = GradingReport::new(analysis(vec![result("bob", 9.1, true)]), "bob", "m", 5);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");

        report.save_json(&path).unwrap();
        let loaded = GradingReport::load_json(&path).unwrap();

        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.analysis.results.len(), 1);
        assert_eq!(loaded.user_id, "bob");
    }
}
