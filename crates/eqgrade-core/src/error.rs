//! Grading error types.
//!
//! `AnalysisError` is what the engine returns at its boundary. The other
//! types describe individual failure modes; some of them are recovered
//! inside the pipeline and only ever surface as warnings.

use thiserror::Error;

/// Which side of the comparison an extraction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerRole {
    Master,
    Student,
}

impl std::fmt::Display for AnswerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerRole::Master => write!(f, "master"),
            AnswerRole::Student => write!(f, "student"),
        }
    }
}

/// The answer store has no data for the requested question or user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("master answer not found for question '{question_id}'")]
    MasterAnswer { question_id: String },

    #[error("no student answers found for question '{question_id}' and user '{user_id}'")]
    StudentAnswers {
        question_id: String,
        user_id: String,
    },
}

/// The extraction capability returned something unusable.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Empty output for the master answer. Without reference equations
    /// nothing can be scored.
    #[error("extraction returned empty output for the master answer")]
    EmptyMasterOutput,

    /// The output was not valid JSON.
    #[error("extraction output for the {role} answer is not valid JSON: {source}\nraw output:\n{raw}")]
    MalformedJson {
        role: AnswerRole,
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    /// The output was valid JSON but not an array.
    #[error("extraction output for the {role} answer is not a JSON array")]
    NotAnArray { role: AnswerRole },
}

/// A single extracted record lacks a required field. Recovered by skipping
/// the record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {role} equation record at index {index}: {reason}")]
pub struct MalformedRecordError {
    pub role: AnswerRole,
    pub index: usize,
    pub reason: String,
}

/// The feedback response could not be decoded. Recovered as `None` feedback.
#[derive(Debug, Error)]
#[error("feedback response is not valid feedback JSON: {source}")]
pub struct FeedbackParseError {
    #[from]
    source: serde_json::Error,
}

/// A submission rejected before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("master answer cannot be empty")]
    EmptyMasterAnswer,

    #[error("student answers list cannot be empty")]
    NoStudentAnswers,

    #[error("invalid question id '{0}'")]
    InvalidQuestionId(String),
}

/// Errors returned by the grading engine.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Any other failure, typically an external capability call.
    #[error("analysis failed: {0:#}")]
    Failed(#[from] anyhow::Error),
}

impl AnalysisError {
    /// Returns `true` if the requested answers do not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AnalysisError::NotFound(_))
    }
}
