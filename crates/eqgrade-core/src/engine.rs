//! Central grading engine.
//!
//! Runs the answer-comparison pipeline for one master/student pair and
//! orchestrates whole-question analyses against an answer store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AnalysisError, AnswerRole, NotFoundError};
use crate::extractor::EquationExtractor;
use crate::feedback::{FeedbackGenerator, FeedbackInput};
use crate::matcher::match_equations;
use crate::model::{
    AnalysisResult, EquationRecord, FeedbackPayload, MatchResult, QuestionAnalysis, ScoreBundle,
};
use crate::normalizer::process_extractions;
use crate::similarity::SemanticScorer;
use crate::substitution::substitute;
use crate::traits::{AnswerStore, EmbeddingProvider, LlmProvider};

/// Configuration for the grading engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model used for extraction and feedback generation.
    pub generation_model: String,
    /// Temperature for generation.
    pub temperature: f64,
    /// Max tokens for generation.
    pub max_tokens: u32,
    /// Maximum students graded concurrently within one analysis.
    pub parallelism: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            generation_model: "gemini-1.5-flash".to_string(),
            temperature: 0.0,
            max_tokens: 2048,
            parallelism: 1,
        }
    }
}

/// Model clients shared by every pipeline run.
///
/// Built once at startup and handed to the engine.
#[derive(Clone)]
pub struct ModelClients {
    /// Text generation for extraction and feedback.
    pub generator: Arc<dyn LlmProvider>,
    /// Embeddings for equation matching.
    pub equation_embedder: Arc<dyn EmbeddingProvider>,
    /// General-purpose sentence-embedding model.
    pub sbert_embedder: Arc<dyn EmbeddingProvider>,
    /// Query-prefixed embedding model.
    pub e5_embedder: Arc<dyn EmbeddingProvider>,
}

/// Full trace of grading one student answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    pub master_equations: Vec<EquationRecord>,
    pub student_equations: Vec<EquationRecord>,
    pub match_result: MatchResult,
    pub descriptive_master: String,
    pub descriptive_student: String,
    pub scores: ScoreBundle,
    pub feedback: Option<FeedbackPayload>,
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_student_start(&self, student_id: &str, index: usize, total: usize);
    fn on_student_complete(&self, result: &AnalysisResult);
    fn on_student_error(&self, student_id: &str, error: &str);
    fn on_analysis_complete(&self, question_id: &str, graded: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_student_start(&self, _: &str, _: usize, _: usize) {}
    fn on_student_complete(&self, _: &AnalysisResult) {}
    fn on_student_error(&self, _: &str, _: &str) {}
    fn on_analysis_complete(&self, _: &str, _: usize, _: Duration) {}
}

/// The grading engine.
pub struct GradingEngine {
    extractor: EquationExtractor,
    equation_embedder: Arc<dyn EmbeddingProvider>,
    sbert: SemanticScorer,
    e5: SemanticScorer,
    feedback: FeedbackGenerator,
    config: EngineConfig,
}

impl GradingEngine {
    pub fn new(clients: ModelClients, config: EngineConfig) -> Self {
        Self {
            extractor: EquationExtractor::new(
                Arc::clone(&clients.generator),
                &config.generation_model,
                config.max_tokens,
                config.temperature,
            ),
            equation_embedder: clients.equation_embedder,
            sbert: SemanticScorer::sentence(clients.sbert_embedder),
            e5: SemanticScorer::query(clients.e5_embedder),
            feedback: FeedbackGenerator::new(
                clients.generator,
                &config.generation_model,
                config.max_tokens,
                config.temperature,
            ),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Grade one student answer against a master answer.
    #[instrument(skip_all)]
    pub async fn grade(&self, master_text: &str, student_text: &str) -> Result<Grade, AnalysisError> {
        let start = Instant::now();

        let master_raw = self.extractor.extract(master_text, AnswerRole::Master).await?;
        let student_raw = self
            .extractor
            .extract(student_text, AnswerRole::Student)
            .await?;
        let master_equations = process_extractions(master_raw);
        let student_equations = process_extractions(student_raw);

        let match_result = match_equations(
            &master_equations,
            &student_equations,
            self.equation_embedder.as_ref(),
        )
        .await?;

        let descriptive_master = substitute(master_text, &master_equations);
        let descriptive_student = substitute(student_text, &student_equations);

        let sbert_score = self
            .sbert
            .score(&descriptive_master, &descriptive_student)
            .await?;
        let e5_score = self
            .e5
            .score(&descriptive_master, &descriptive_student)
            .await?;
        let scores = ScoreBundle::fuse(match_result.final_equation_score, sbert_score, e5_score);

        let feedback = self
            .feedback
            .generate(&FeedbackInput {
                master_text: &descriptive_master,
                student_text: &descriptive_student,
                unmatched: &match_result.feedback_matrix,
                scores: &scores,
            })
            .await?;

        tracing::info!(
            equation_score = scores.equation_score,
            sbert_score = scores.sbert_score,
            e5_score = scores.e5_score,
            final_score = scores.final_score,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "graded answer"
        );

        Ok(Grade {
            master_equations,
            student_equations,
            match_result,
            descriptive_master,
            descriptive_student,
            scores,
            feedback,
        })
    }

    /// Grade every answer `user_id` submitted for `question_id`.
    ///
    /// Results keep store order. The first failing student aborts the whole
    /// analysis.
    #[instrument(skip(self, store, progress))]
    pub async fn analyze(
        &self,
        store: &dyn AnswerStore,
        question_id: &str,
        user_id: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<QuestionAnalysis, AnalysisError> {
        let start = Instant::now();

        let master = store
            .master_answer(question_id)
            .await?
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| NotFoundError::MasterAnswer {
                question_id: question_id.to_string(),
            })?;

        let answers = store.student_answers(question_id, user_id).await?;
        if answers.is_empty() {
            return Err(NotFoundError::StudentAnswers {
                question_id: question_id.to_string(),
                user_id: user_id.to_string(),
            }
            .into());
        }

        let total = answers.len();
        let master = master.as_str();
        let results: Vec<AnalysisResult> = stream::iter(answers.iter().enumerate())
            .map(move |(index, answer)| async move {
                progress.on_student_start(&answer.student_id, index, total);
                match self.grade(master, &answer.answer_text).await {
                    Ok(grade) => {
                        let result = AnalysisResult {
                            student_id: answer.student_id.clone(),
                            final_score: grade.scores.final_score,
                            feedback: grade.feedback,
                        };
                        progress.on_student_complete(&result);
                        Ok(result)
                    }
                    Err(e) => {
                        tracing::error!(student_id = %answer.student_id, "grading failed: {e}");
                        progress.on_student_error(&answer.student_id, &e.to_string());
                        Err(e)
                    }
                }
            })
            .buffered(self.config.parallelism.max(1))
            .try_collect()
            .await?;

        progress.on_analysis_complete(question_id, results.len(), start.elapsed());

        Ok(QuestionAnalysis {
            question_id: question_id.to_string(),
            results,
        })
    }
}
