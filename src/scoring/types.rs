#[derive(Debug, Clone, Copy, PartialEq)]
/// Outcome of scoring one answer pair.
pub struct PairScore {
    /// Raw cosine similarity (unclamped).
    pub similarity: f64,
    /// Calibrated grade in `[0, max_score]`, two decimals.
    pub final_score: f64,
}
