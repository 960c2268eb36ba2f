use thiserror::Error;

use crate::artifact::ArtifactError;
use crate::embedding::EmbeddingError;

/// Reasons the model could not be made ready. Every variant means "model unavailable".
///
/// `Clone` so one failed materialization can be handed to every waiter.
#[derive(Error, Debug, Clone)]
pub enum ModelCacheError {
    #[error("no model objects found under prefix '{prefix}'")]
    EmptyPrefix { prefix: String },

    #[error("model bundle is missing its {family} file")]
    MissingFile { family: &'static str },

    #[error("corrupt model bundle object '{object}': {reason}")]
    CorruptBundle { object: String, reason: String },

    #[error("artifact store error: {0}")]
    Store(String),

    #[error("I/O error while materializing model: {0}")]
    Io(String),

    #[error("failed to load model: {0}")]
    Load(String),

    #[error("model materialization task aborted: {0}")]
    Aborted(String),
}

impl From<ArtifactError> for ModelCacheError {
    fn from(e: ArtifactError) -> Self {
        ModelCacheError::Store(e.to_string())
    }
}

impl From<std::io::Error> for ModelCacheError {
    fn from(e: std::io::Error) -> Self {
        ModelCacheError::Io(e.to_string())
    }
}

impl From<EmbeddingError> for ModelCacheError {
    fn from(e: EmbeddingError) -> Self {
        ModelCacheError::Load(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ModelCacheError {
    fn from(e: tokio::task::JoinError) -> Self {
        ModelCacheError::Aborted(e.to_string())
    }
}
