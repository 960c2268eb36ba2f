use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use semgrade::{
    AppState, ArtifactStore, BatchScorer, Calibration, Config, ModelCache, ModelCacheConfig,
    SimilarityScorer, create_router,
};

pub struct TestServerConfig {
    pub store: Arc<dyn ArtifactStore>,
    pub prefix: String,
    pub calibration: Calibration,
    pub max_batch_size: usize,
    pub request_timeout: Duration,
}

impl TestServerConfig {
    pub fn with_store(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            prefix: super::MODEL_PREFIX.to_string(),
            calibration: Calibration::Linear,
            max_batch_size: 50,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// A server bound to an ephemeral port. Aborted on drop.
pub struct TestServer {
    pub addr: SocketAddr,
    pub cache: ModelCache,
    handle: JoinHandle<()>,
    _model_dir: TempDir,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_stub_server(config: TestServerConfig) -> anyhow::Result<TestServer> {
    let model_dir = TempDir::new()?;
    let cache_config = ModelCacheConfig::stub(&config.prefix, model_dir.path().join("model"));
    spawn_server(config, cache_config, model_dir).await
}

pub async fn spawn_server(
    config: TestServerConfig,
    cache_config: ModelCacheConfig,
    model_dir: TempDir,
) -> anyhow::Result<TestServer> {
    let cache = ModelCache::new(cache_config, config.store);
    let server_config = Config {
        port: 0,
        max_batch_size: config.max_batch_size,
        request_timeout: config.request_timeout,
        calibration: config.calibration,
        ..Config::default()
    };

    let scorer = BatchScorer::new(
        cache.clone(),
        SimilarityScorer::new(server_config.calibration),
        server_config.batch_parallelism,
    );
    let app = create_router(
        AppState::new(scorer, server_config.max_batch_size),
        &server_config,
    );

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(TestServer {
        addr,
        cache,
        handle,
        _model_dir: model_dir,
    })
}
