//! Best-match alignment of master equations against student equations.
//!
//! Every master equation is paired with its single most similar student
//! equation, independently of the other pairings. This is not a bipartite
//! matching: one student equation may be the best match for several master
//! equations.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use tracing::instrument;

use crate::model::{EquationRecord, FeedbackEntry, MatchResult};
use crate::similarity::dot;
use crate::traits::EmbeddingProvider;

/// Minimum similarity for a master equation to count as matched.
pub const MATCH_THRESHOLD: f32 = 0.90;

/// Align `master` against `student` and score the alignment.
///
/// Embeddings are assumed unit-normalized, so the dot product is used as
/// cosine similarity.
#[instrument(skip_all, fields(master = master.len(), student = student.len(), embedder = embedder.name()))]
pub async fn match_equations(
    master: &[EquationRecord],
    student: &[EquationRecord],
    embedder: &dyn EmbeddingProvider,
) -> Result<MatchResult> {
    let unique_master: HashSet<&str> = master.iter().map(|m| m.equation.as_str()).collect();
    let total = unique_master.len();

    let mut cache = EmbeddingCache::new(embedder);
    let mut student_vectors = Vec::with_capacity(student.len());
    if !master.is_empty() {
        for record in student {
            student_vectors.push(cache.embed(&record.match_text()).await?);
        }
    }

    let mut matched: HashSet<&str> = HashSet::new();
    let mut feedback_matrix = Vec::new();

    for master_eq in master {
        let mut best_similarity = 0.0f32;
        let mut best_student: Option<&EquationRecord> = None;

        if !student.is_empty() {
            let master_vec = cache.embed(&master_eq.match_text()).await?;
            for (student_eq, student_vec) in student.iter().zip(&student_vectors) {
                let similarity = dot(&master_vec, student_vec)?;
                tracing::debug!(
                    master = %master_eq.equation,
                    student = %student_eq.equation,
                    similarity,
                    "compared equations"
                );
                if similarity > best_similarity {
                    best_similarity = similarity;
                    best_student = Some(student_eq);
                }
            }
        }

        if best_similarity >= MATCH_THRESHOLD {
            tracing::info!(
                master = %master_eq.equation,
                student = best_student.map(|s| s.equation.as_str()).unwrap_or_default(),
                similarity = best_similarity,
                "equation matched"
            );
            matched.insert(master_eq.equation.as_str());
        } else {
            tracing::info!(
                master = %master_eq.equation,
                similarity = best_similarity,
                "equation not matched"
            );
            feedback_matrix.push(FeedbackEntry {
                equation: master_eq.equation.clone(),
                description: master_eq.description.clone(),
                best_similarity: round4(best_similarity),
                closest_match: best_student.map(|s| s.equation.clone()),
            });
        }
    }

    let score = matched.len();
    let final_equation_score = if total > 0 {
        score as f64 / total as f64
    } else {
        0.0
    };

    Ok(MatchResult {
        score,
        total_master_equations: total,
        final_equation_score,
        feedback_matrix,
    })
}

fn round4(value: f32) -> f64 {
    (f64::from(value) * 10_000.0).round() / 10_000.0
}

/// Per-call memo of text embeddings.
struct EmbeddingCache<'a> {
    embedder: &'a dyn EmbeddingProvider,
    vectors: HashMap<String, Vec<f32>>,
}

impl<'a> EmbeddingCache<'a> {
    fn new(embedder: &'a dyn EmbeddingProvider) -> Self {
        Self {
            embedder,
            vectors: HashMap::new(),
        }
    }

    async fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        if let Some(vector) = self.vectors.get(text) {
            return Ok(vector.clone());
        }
        let vector = self.embedder.embed(text).await?;
        self.vectors.insert(text.to_string(), vector.clone());
        Ok(vector)
    }
}
