use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact store operation failed: {0}")]
    StoreError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact not found: {object}")]
    NotFound { object: String },
}

pub type ArtifactResult<T> = Result<T, ArtifactError>;
