use thiserror::Error;

use crate::model_cache::ModelCacheError;
use crate::scoring::ScoringError;

#[derive(Debug, Clone, Error)]
pub enum GradingError {
    /// Malformed item. Isolated to that item.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Model could not be made ready. Fails the whole batch.
    #[error("model unavailable: {0}")]
    ModelUnavailable(#[from] ModelCacheError),

    /// Embedding or similarity failed for one item.
    #[error("scoring failed: {0}")]
    ScoringFailed(String),

    #[error("scoring task aborted: {0}")]
    Aborted(String),
}

impl GradingError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        GradingError::InvalidInput(reason.into())
    }
}

impl From<ScoringError> for GradingError {
    fn from(e: ScoringError) -> Self {
        match e {
            ScoringError::InvalidInput { reason } => GradingError::InvalidInput(reason),
            other => GradingError::ScoringFailed(other.to_string()),
        }
    }
}
