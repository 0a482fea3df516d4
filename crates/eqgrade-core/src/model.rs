//! Core data model types for eqgrade.
//!
//! These are the typed records that flow through the grading pipeline:
//! extracted equations, match results, score bundles, and the per-student
//! analysis results returned to callers.

use serde::{Deserialize, Serialize};

/// An equation/description pair as returned by the extraction capability,
/// before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEquation {
    /// The equation exactly as it appears in the answer text.
    pub equation: String,
    /// Natural-language verbalization of the equation.
    pub description: String,
}

/// A normalized equation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquationRecord {
    /// Canonical form used for matching and de-duplication.
    pub equation: String,
    /// Original equation text, used to locate the equation in the answer.
    pub raw_equation: String,
    /// Natural-language verbalization.
    pub description: String,
}

impl EquationRecord {
    /// Text that gets embedded when comparing equations.
    pub fn match_text(&self) -> String {
        format!("{}. Description: {}", self.equation, self.description)
    }
}

/// One unmatched master equation, reported back to the feedback stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    /// Canonical master equation.
    pub equation: String,
    /// Description of the master equation.
    pub description: String,
    /// Best similarity found among the student equations (4 decimals).
    pub best_similarity: f64,
    /// Canonical form of the closest student equation, if any.
    pub closest_match: Option<String>,
}

/// Outcome of aligning master equations against student equations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Number of distinct master equations matched.
    pub score: usize,
    /// Number of distinct canonical master equations.
    pub total_master_equations: usize,
    /// `score / total_master_equations`, or 0 when there are no master equations.
    pub final_equation_score: f64,
    /// Unmatched master equations, in master order.
    pub feedback_matrix: Vec<FeedbackEntry>,
}

/// All metrics computed for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBundle {
    /// Equation match score in `[0, 1]`.
    pub equation_score: f64,
    /// Similarity under the general-purpose sentence-embedding model.
    pub sbert_score: f64,
    /// Similarity under the query-prefixed embedding model.
    pub e5_score: f64,
    /// Fused score in `[0, 10]`, one decimal.
    pub final_score: f64,
}

/// Structured qualitative feedback produced by the text-generation capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPayload {
    pub score_out_of_10: f64,
    pub verdict: String,
    pub comment: String,
    pub advice: String,
}

/// Per-student result of an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub student_id: String,
    pub final_score: f64,
    /// `None` when the feedback response could not be parsed.
    pub feedback: Option<FeedbackPayload>,
}

/// Top-level result of analyzing one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnalysis {
    #[serde(rename = "questionId")]
    pub question_id: String,
    pub results: Vec<AnalysisResult>,
}

/// A stored student answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAnswer {
    pub student_id: String,
    pub answer_text: String,
}

/// A master answer together with the student answers graded against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    #[serde(rename = "questionId")]
    pub question_id: String,
    pub master_answer: String,
    pub student_answers: Vec<StudentAnswer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_text_format() {
        let record = EquationRecord {
            equation: "E=mc^2".into(),
            raw_equation: "E = mc²".into(),
            description: "energy equals mass times c squared".into(),
        };
        assert_eq!(
            record.match_text(),
            "E=mc^2. Description: energy equals mass times c squared"
        );
    }

    #[test]
    fn question_analysis_uses_camel_case_id() {
        let analysis = QuestionAnalysis {
            question_id: "q1".into(),
            results: vec![AnalysisResult {
                student_id: "s1".into(),
                final_score: 7.5,
                feedback: None,
            }],
        };
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["questionId"], "q1");
        assert!(json["results"][0]["feedback"].is_null());
    }

    #[test]
    fn submission_parses_store_payload() {
        let payload = r#"{
            "questionId": "q-42",
            "master_answer": "F = ma",
            "student_answers": [{"student_id": "s1", "answer_text": "F=ma"}]
        }"#;
        let submission: AnswerSubmission = serde_json::from_str(payload).unwrap();
        assert_eq!(submission.question_id, "q-42");
        assert_eq!(submission.student_answers.len(), 1);
    }
}
