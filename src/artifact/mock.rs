use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::error::{ArtifactError, ArtifactResult};
use super::store::ArtifactStore;

/// In-memory [`ArtifactStore`] with call counters and failure injection.
#[derive(Default)]
pub struct MemoryArtifactStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    failing: RwLock<HashSet<String>>,
    latency: RwLock<Option<Duration>>,
    list_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `data` under `name`, replacing any previous content.
    pub fn insert(&self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects.write().insert(name.into(), data.into());
    }

    pub fn remove(&self, name: &str) {
        self.objects.write().remove(name);
    }

    /// Makes every download of `name` fail until cleared.
    pub fn fail_downloads_of(&self, name: impl Into<String>) {
        self.failing.write().insert(name.into());
    }

    pub fn clear_failures(&self) {
        self.failing.write().clear();
    }

    /// Delays every list/download call (used to widen cold-start races in tests).
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = Some(latency);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn list(&self, prefix: &str) -> ArtifactResult<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let names = self
            .objects
            .read()
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        Ok(names)
    }

    async fn download(&self, object: &str, dest: &Path) -> ArtifactResult<()> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.failing.read().contains(object) {
            return Err(ArtifactError::StoreError(format!(
                "injected failure for {object}"
            )));
        }

        let data = self
            .objects
            .read()
            .get(object)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound {
                object: object.to_string(),
            })?;
        tokio::fs::write(dest, data).await?;
        Ok(())
    }
}
