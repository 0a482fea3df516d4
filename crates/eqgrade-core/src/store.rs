//! Answer stores.
//!
//! A submission is one master answer plus the student answers graded
//! against it. `FileAnswerStore` keeps one JSON document per question;
//! `InMemoryAnswerStore` is for tests and embedding callers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::error::SubmissionError;
use crate::model::{AnswerSubmission, StudentAnswer};
use crate::traits::AnswerStore;

impl AnswerSubmission {
    /// Reject submissions that can never be graded.
    pub fn validate(&self) -> Result<(), SubmissionError> {
        let id = self.question_id.as_str();
        if id.trim().is_empty()
            || id == "."
            || id == ".."
            || id.contains(['/', '\\'])
            || id.chars().any(char::is_control)
        {
            return Err(SubmissionError::InvalidQuestionId(self.question_id.clone()));
        }
        if self.master_answer.trim().is_empty() {
            return Err(SubmissionError::EmptyMasterAnswer);
        }
        if self.student_answers.is_empty() {
            return Err(SubmissionError::NoStudentAnswers);
        }
        Ok(())
    }

    fn answers_for(&self, user_id: &str) -> Vec<StudentAnswer> {
        self.student_answers
            .iter()
            .filter(|a| a.student_id == user_id)
            .cloned()
            .collect()
    }
}

/// File-backed store: `<dir>/<questionId>.json`.
#[derive(Debug, Clone)]
pub struct FileAnswerStore {
    dir: PathBuf,
}

impl FileAnswerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validate and persist a submission, replacing any previous one for the
    /// same question. Returns the written path.
    pub fn save(&self, submission: &AnswerSubmission) -> Result<PathBuf> {
        submission.validate()?;

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create storage dir {}", self.dir.display()))?;
        let path = self.path_for(&submission.question_id);
        let json =
            serde_json::to_string_pretty(submission).context("failed to serialize submission")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write submission to {}", path.display()))?;

        tracing::info!(
            question_id = %submission.question_id,
            students = submission.student_answers.len(),
            path = %path.display(),
            "stored submission"
        );
        Ok(path)
    }

    /// Load the submission for a question, if one is stored.
    pub async fn load(&self, question_id: &str) -> Result<Option<AnswerSubmission>> {
        if question_id.contains(['/', '\\']) || question_id == ".." {
            return Ok(None);
        }
        let path = self.path_for(question_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        let submission = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse submission {}", path.display()))?;
        Ok(Some(submission))
    }

    fn path_for(&self, question_id: &str) -> PathBuf {
        self.dir.join(format!("{question_id}.json"))
    }
}

#[async_trait]
impl AnswerStore for FileAnswerStore {
    async fn master_answer(&self, question_id: &str) -> Result<Option<String>> {
        Ok(self.load(question_id).await?.map(|s| s.master_answer))
    }

    async fn student_answers(
        &self,
        question_id: &str,
        user_id: &str,
    ) -> Result<Vec<StudentAnswer>> {
        Ok(self
            .load(question_id)
            .await?
            .map(|s| s.answers_for(user_id))
            .unwrap_or_default())
    }
}

/// In-memory store keyed by question id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAnswerStore {
    submissions: HashMap<String, AnswerSubmission>,
}

impl InMemoryAnswerStore {
    pub fn new(submissions: impl IntoIterator<Item = AnswerSubmission>) -> Self {
        Self {
            submissions: submissions
                .into_iter()
                .map(|s| (s.question_id.clone(), s))
                .collect(),
        }
    }

    pub fn insert(&mut self, submission: AnswerSubmission) {
        self.submissions
            .insert(submission.question_id.clone(), submission);
    }
}

#[async_trait]
impl AnswerStore for InMemoryAnswerStore {
    async fn master_answer(&self, question_id: &str) -> Result<Option<String>> {
        Ok(self
            .submissions
            .get(question_id)
            .map(|s| s.master_answer.clone()))
    }

    async fn student_answers(
        &self,
        question_id: &str,
        user_id: &str,
    ) -> Result<Vec<StudentAnswer>> {
        Ok(self
            .submissions
            .get(question_id)
            .map(|s| s.answers_for(user_id))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(question_id: &str) -> AnswerSubmission {
        AnswerSubmission {
            question_id: question_id.into(),
            master_answer: "Newton: F = ma".into(),
            student_answers: vec![
                StudentAnswer {
                    student_id: "alice".into(),
                    answer_text: "F = m a".into(),
                },
                StudentAnswer {
                    student_id: "bob".into(),
                    answer_text: "force is mass times acceleration".into(),
                },
                StudentAnswer {
                    student_id: "alice".into(),
                    answer_text: "second attempt".into(),
                },
            ],
        }
    }

    #[test]
    fn validate_rejects_empty_master() {
        let mut s = submission("q1");
        s.master_answer = "   ".into();
        assert_eq!(s.validate(), Err(SubmissionError::EmptyMasterAnswer));
    }

    #[test]
    fn validate_rejects_no_students() {
        let mut s = submission("q1");
        s.student_answers.clear();
        assert_eq!(s.validate(), Err(SubmissionError::NoStudentAnswers));
    }

    #[test]
    fn validate_rejects_path_like_ids() {
        for id in ["", "..", "a/b", "a\\b", "."] {
            assert!(
                matches!(
                    submission(id).validate(),
                    Err(SubmissionError::InvalidQuestionId(_))
                ),
                "{id:?} should be rejected"
            );
        }
        assert!(submission("physics-101_q3").validate().is_ok());
    }

    #[tokio::test]
    async fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAnswerStore::new(dir.path().join("storage"));

        let path = store.save(&submission("q1")).unwrap();
        assert!(path.ends_with("q1.json"));

        let master = store.master_answer("q1").await.unwrap();
        assert_eq!(master.as_deref(), Some("Newton: F = ma"));

        let answers = store.student_answers("q1", "alice").await.unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[1].answer_text, "second attempt");
    }

    #[tokio::test]
    async fn file_store_missing_question() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAnswerStore::new(dir.path());

        assert_eq!(store.master_answer("nope").await.unwrap(), None);
        assert!(store.student_answers("nope", "alice").await.unwrap().is_empty());
        assert_eq!(store.master_answer("../etc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_rejects_invalid_submission() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAnswerStore::new(dir.path());
        let mut s = submission("q1");
        s.student_answers.clear();

        assert!(store.save(&s).is_err());
        assert!(!dir.path().join("q1.json").exists());
    }

    #[tokio::test]
    async fn file_store_reports_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let store = FileAnswerStore::new(dir.path());

        assert!(store.master_answer("bad").await.is_err());
    }

    #[tokio::test]
    async fn in_memory_store_filters_by_user() {
        let store = InMemoryAnswerStore::new([submission("q1")]);

        let answers = store.student_answers("q1", "bob").await.unwrap();
        assert_eq!(answers.len(), 1);
        assert!(store.student_answers("q1", "carol").await.unwrap().is_empty());
        assert!(store.student_answers("q2", "bob").await.unwrap().is_empty());
        assert_eq!(store.master_answer("q2").await.unwrap(), None);
    }
}
