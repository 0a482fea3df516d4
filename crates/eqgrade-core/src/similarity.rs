//! Semantic similarity between the descriptive master and student texts.
//!
//! Two scorers are run over two independently trained embedding models to
//! reduce single-model bias. Both are pure functions of the text pair and
//! the model weights.

use std::sync::Arc;

use anyhow::{ensure, Result};
use tracing::instrument;

use crate::traits::EmbeddingProvider;

/// Prefix the query-style embedding model expects in front of every input.
pub const QUERY_PREFIX: &str = "query: ";

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> Result<f32> {
    ensure!(
        a.len() == b.len(),
        "embedding dimension mismatch: {} vs {}",
        a.len(),
        b.len()
    );
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

/// Cosine similarity of two vectors; 0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let dot = dot(a, b)?;
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Scale a vector to unit L2 norm. Zero vectors are returned unchanged.
pub fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-12);
    for x in &mut v {
        *x /= norm;
    }
    v
}

/// Embedding-based similarity scorer.
pub struct SemanticScorer {
    embedder: Arc<dyn EmbeddingProvider>,
    prefix: Option<&'static str>,
    normalize: bool,
}

impl SemanticScorer {
    /// General-purpose sentence-embedding scorer: plain cosine similarity.
    pub fn sentence(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            prefix: None,
            normalize: false,
        }
    }

    /// Query-style scorer: inputs get the `"query: "` prefix and embeddings
    /// are L2-normalized before comparison.
    pub fn query(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            prefix: Some(QUERY_PREFIX),
            normalize: true,
        }
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    /// Similarity of `a` and `b`, in `[-1, 1]`.
    #[instrument(skip_all, fields(embedder = self.embedder.name(), model = self.embedder.model()))]
    pub async fn score(&self, a: &str, b: &str) -> Result<f64> {
        let a = self.encode(a).await?;
        let b = self.encode(b).await?;
        let similarity = f64::from(cosine_similarity(&a, &b)?);
        tracing::debug!(similarity, "scored text pair");
        Ok(similarity)
    }

    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let input = match self.prefix {
            Some(prefix) => format!("{prefix}{text}"),
            None => text.to_string(),
        };
        let vector = self.embedder.embed(&input).await?;
        Ok(if self.normalize {
            l2_normalize(vector)
        } else {
            vector
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    struct RecordingEmbedder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EmbeddingProvider for RecordingEmbedder {
        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "recording"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(if text.contains("cat") {
                vec![3.0, 4.0]
            } else {
                vec![4.0, 3.0]
            })
        }
    }

    #[test]
    fn cosine_identical_vectors() {
        let a = [1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let sim = cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]).unwrap();
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        assert!(dot(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn normalize_to_unit_length() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn query_scorer_prefixes_inputs() {
        let embedder = Arc::new(RecordingEmbedder {
            seen: Mutex::new(vec![]),
        });
        let scorer = SemanticScorer::query(embedder.clone());

        let sim = scorer.score("a cat", "a dog").await.unwrap();
        assert!((sim - 0.96).abs() < 1e-6);

        let seen = embedder.seen.lock().unwrap();
        assert_eq!(*seen, vec!["query: a cat", "query: a dog"]);
    }

    #[tokio::test]
    async fn sentence_scorer_passes_text_through() {
        let embedder = Arc::new(RecordingEmbedder {
            seen: Mutex::new(vec![]),
        });
        let scorer = SemanticScorer::sentence(embedder.clone());

        let sim = scorer.score("cat", "cat").await.unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
        assert_eq!(*embedder.seen.lock().unwrap(), vec!["cat", "cat"]);
    }
}
