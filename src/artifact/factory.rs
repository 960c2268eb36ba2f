use std::sync::Arc;

use super::config::{ArtifactConfig, ArtifactProvider};
use super::store::{ArtifactStore, GcsArtifactStore, LocalArtifactStore};

/// Builds the appropriate [`ArtifactStore`] implementation for the config.
pub fn build_artifact_store(config: &ArtifactConfig) -> Arc<dyn ArtifactStore> {
    match config.provider {
        ArtifactProvider::Gcs => Arc::new(GcsArtifactStore::new(config.bucket.clone())),
        ArtifactProvider::Local => Arc::new(LocalArtifactStore::new(config.local_root.clone())),
    }
}
