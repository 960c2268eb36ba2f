use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};

use super::bundle::{BundleManifest, materialize_bundle};
use super::config::ModelCacheConfig;
use super::error::ModelCacheError;
use crate::artifact::ArtifactStore;
use crate::embedding::{EncoderConfig, SentenceEncoder};

type LoadResult = Result<Arc<SentenceEncoder>, ModelCacheError>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
/// Observable model state.
pub enum ModelStatus {
    Cold,
    Loading,
    Ready,
}

enum Slot {
    Empty,
    Loading(SharedLoad),
    Ready(Arc<SentenceEncoder>),
}

struct Inner {
    config: ModelCacheConfig,
    store: Arc<dyn ArtifactStore>,
    slot: Mutex<Slot>,
    manifest: Mutex<Option<BundleManifest>>,
    materializations: AtomicUsize,
}

/// Process-wide owner of the loaded model.
///
/// Cheap to clone; clones share state. Concurrent cold callers of
/// [`ensure_ready`](Self::ensure_ready) join a single in-flight load. The load runs on
/// its own task, so a caller that gives up (timeout, disconnect) does not cancel it.
#[derive(Clone)]
pub struct ModelCache {
    inner: Arc<Inner>,
}

impl ModelCache {
    pub fn new(config: ModelCacheConfig, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                slot: Mutex::new(Slot::Empty),
                manifest: Mutex::new(None),
                materializations: AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ModelCacheConfig {
        &self.inner.config
    }

    /// Returns the loaded model, materializing and loading it on first use.
    ///
    /// Failures are returned to every waiter of that attempt and are not remembered:
    /// the next call starts a fresh attempt.
    pub async fn ensure_ready(&self) -> LoadResult {
        let load = {
            let mut slot = self.inner.slot.lock();
            match &*slot {
                Slot::Ready(encoder) => return Ok(Arc::clone(encoder)),
                Slot::Loading(load) => load.clone(),
                Slot::Empty => {
                    let load = Arc::clone(&self.inner).spawn_load();
                    *slot = Slot::Loading(load.clone());
                    load
                }
            }
        };
        load.await
    }

    /// The loaded model, if ready. Never triggers a load.
    pub fn get(&self) -> Option<Arc<SentenceEncoder>> {
        match &*self.inner.slot.lock() {
            Slot::Ready(encoder) => Some(Arc::clone(encoder)),
            _ => None,
        }
    }

    pub fn status(&self) -> ModelStatus {
        match &*self.inner.slot.lock() {
            Slot::Empty => ModelStatus::Cold,
            Slot::Loading(_) => ModelStatus::Loading,
            Slot::Ready(_) => ModelStatus::Ready,
        }
    }

    /// Manifest of the materialized bundle the model was loaded from (`None` for a fallback).
    pub fn manifest(&self) -> Option<BundleManifest> {
        self.inner.manifest.lock().clone()
    }

    /// Number of materialization attempts made so far.
    pub fn materialization_count(&self) -> usize {
        self.inner.materializations.load(Ordering::SeqCst)
    }
}

impl Inner {
    fn spawn_load(self: Arc<Self>) -> SharedLoad {
        let task = tokio::spawn(Arc::clone(&self).load());
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    // The task never reached its own slot update.
                    *self.slot.lock() = Slot::Empty;
                    Err(ModelCacheError::from(e))
                }
            }
        }
        .boxed()
        .shared()
    }

    async fn load(self: Arc<Self>) -> LoadResult {
        let started = Instant::now();
        let result = self.materialize_and_load().await;

        let mut slot = self.slot.lock();
        match &result {
            Ok(encoder) => {
                *slot = Slot::Ready(Arc::clone(encoder));
                info!(
                    source = %encoder.source().display(),
                    embedding_dim = encoder.embedding_dim(),
                    stub = encoder.is_stub(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model ready"
                );
            }
            Err(e) => {
                *slot = Slot::Empty;
                error!(
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model unavailable"
                );
            }
        }
        result
    }

    async fn materialize_and_load(&self) -> LoadResult {
        let config = &self.config;

        match self.load_primary().await {
            Ok(encoder) => Ok(encoder),
            Err(e) => match &config.fallback_dir {
                Some(fallback) => {
                    warn!(
                        error = %e,
                        fallback = %fallback.display(),
                        "Primary model unavailable, loading fallback bundle"
                    );
                    load_encoder(fallback.clone(), config.encoder.clone()).await
                }
                None => Err(e),
            },
        }
    }

    /// Materializes the bundle from the store and loads it.
    async fn load_primary(&self) -> LoadResult {
        self.materializations.fetch_add(1, Ordering::SeqCst);
        let config = &self.config;

        info!(
            prefix = %config.bundle_prefix,
            target = %config.local_dir.display(),
            "Materializing model bundle"
        );

        let manifest =
            materialize_bundle(self.store.as_ref(), &config.bundle_prefix, &config.local_dir)
                .await?;
        let encoder = load_encoder(config.local_dir.clone(), config.encoder.clone()).await?;
        *self.manifest.lock() = Some(manifest);
        Ok(encoder)
    }
}

async fn load_encoder(dir: PathBuf, config: EncoderConfig) -> LoadResult {
    let encoder =
        tokio::task::spawn_blocking(move || SentenceEncoder::load(&dir, &config)).await??;
    Ok(Arc::new(encoder))
}
