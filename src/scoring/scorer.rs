use tracing::debug;

use crate::constants::{SCORE_DECIMALS, round_to};
use crate::embedding::SentenceEncoder;

use super::calibration::Calibration;
use super::error::ScoringError;
use super::types::PairScore;

/// Cosine similarity of two vectors, in `[-1, 1]`.
///
/// A zero vector has no direction and scores `0.0` against anything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, ScoringError> {
    if a.len() != b.len() {
        return Err(ScoringError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[derive(Debug, Clone, Copy, Default)]
/// Turns embeddings into a raw similarity and a bounded grade.
pub struct SimilarityScorer {
    calibration: Calibration,
}

impl SimilarityScorer {
    pub fn new(calibration: Calibration) -> Self {
        Self { calibration }
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Raw cosine similarity. Not clamped: out-of-range values are reported as-is.
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> Result<f64, ScoringError> {
        cosine_similarity(a, b)
    }

    /// Grade in `[0, max_score]`, rounded to two decimals.
    ///
    /// A `max_score` that is not a finite positive number yields 0.
    pub fn final_score(&self, similarity: f64, max_score: f64) -> f64 {
        if !(max_score.is_finite() && max_score > 0.0) {
            return 0.0;
        }
        let clamped = if similarity.is_nan() {
            0.0
        } else {
            similarity.clamp(0.0, 1.0)
        };
        let score = round_to(self.calibration.fraction(clamped) * max_score, SCORE_DECIMALS);
        score.clamp(0.0, max_score)
    }

    /// Embeds both answers and scores the student answer against the key.
    pub fn score_pair(
        &self,
        encoder: &SentenceEncoder,
        key_answer: &str,
        student_answer: &str,
        max_score: f64,
    ) -> Result<PairScore, ScoringError> {
        if !(max_score.is_finite() && max_score > 0.0) {
            return Err(ScoringError::InvalidInput {
                reason: format!("max_score must be a positive number, got {max_score}"),
            });
        }

        let key = encoder.embed(key_answer)?;
        let student = encoder.embed(student_answer)?;
        let similarity = self.similarity(&key, &student)?;
        let final_score = self.final_score(similarity, max_score);

        debug!(
            similarity,
            final_score,
            max_score,
            calibration = %self.calibration,
            "Scored answer pair"
        );

        Ok(PairScore {
            similarity,
            final_score,
        })
    }
}
