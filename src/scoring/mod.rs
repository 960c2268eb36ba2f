//! Similarity scoring and grade calibration.
//!
//! The raw cosine similarity is reported unclamped so calibration tooling can see
//! out-of-range values; the final grade is always clamped into `[0, max_score]`.

pub mod calibration;
pub mod error;
pub mod scorer;
pub mod types;


pub use calibration::Calibration;
pub use error::ScoringError;
pub use scorer::{SimilarityScorer, cosine_similarity};
pub use types::PairScore;
