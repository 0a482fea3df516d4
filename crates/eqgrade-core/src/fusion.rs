//! Score fusion.

use crate::model::ScoreBundle;

pub const EQUATION_WEIGHT: f64 = 0.5;
pub const SBERT_WEIGHT: f64 = 0.25;
pub const E5_WEIGHT: f64 = 0.25;

/// Weighted average of the three metrics, scaled to 10 and rounded to one
/// decimal. Ties round to even.
pub fn fuse(equation_score: f64, sbert_score: f64, e5_score: f64) -> f64 {
    let weighted =
        EQUATION_WEIGHT * equation_score + SBERT_WEIGHT * sbert_score + E5_WEIGHT * e5_score;
    (weighted * 10.0 * 10.0).round_ties_even() / 10.0
}

impl ScoreBundle {
    /// Bundle the metrics together with their fused final score.
    pub fn fuse(equation_score: f64, sbert_score: f64, e5_score: f64) -> Self {
        Self {
            equation_score,
            sbert_score,
            e5_score,
            final_score: fuse(equation_score, sbert_score, e5_score),
        }
    }
}
