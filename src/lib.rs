//! semgrade library crate (used by the server binary and integration tests).
//!
//! Scores free-text exam answers by the cosine similarity of sentence embeddings.
//!
//! # Modules
//!
//! - [`artifact`] - blob storage holding the model bundle ([`ArtifactStore`])
//! - [`model_cache`] - lazy, single-flight bundle materialization ([`ModelCache`])
//! - [`embedding`] - the loaded sentence encoder ([`SentenceEncoder`])
//! - [`scoring`] - cosine similarity and grade calibration ([`SimilarityScorer`])
//! - [`grading`] - batch scoring with per-item failure isolation ([`BatchScorer`])
//! - [`gateway`] - axum HTTP surface
//!
//! ## Test/Mock Support
//! [`artifact::MemoryArtifactStore`] is available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod artifact;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod gateway;
pub mod grading;
pub mod model_cache;
pub mod scoring;

#[cfg(any(test, feature = "mock"))]
pub use artifact::MemoryArtifactStore;
pub use artifact::{
    ArtifactConfig, ArtifactError, ArtifactProvider, ArtifactStore, GcsArtifactStore,
    LocalArtifactStore, build_artifact_store,
};
pub use config::{Config, ConfigError};
pub use embedding::{EmbeddingError, EncoderConfig, SentenceEncoder};
pub use gateway::{AppState, GatewayError, create_router};
pub use grading::{BatchResult, BatchScorer, BatchStatus, GradingError, ScoreResult};
pub use model_cache::{BundleManifest, ModelCache, ModelCacheConfig, ModelCacheError, ModelStatus};
pub use scoring::{Calibration, ScoringError, SimilarityScorer, cosine_similarity};
