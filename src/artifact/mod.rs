//! Artifact store access (the blob storage holding the model bundle).

/// Provider selection and addressing.
pub mod config;
/// Artifact error types.
pub mod error;
/// Factory helpers.
pub mod factory;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod store;


pub use config::{ArtifactConfig, ArtifactProvider};
pub use error::{ArtifactError, ArtifactResult};
pub use factory::build_artifact_store;
#[cfg(any(test, feature = "mock"))]
pub use mock::MemoryArtifactStore;
pub use store::{ArtifactStore, GcsArtifactStore, LocalArtifactStore};
