//! semgrade HTTP server entrypoint.

use std::net::SocketAddr;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use semgrade::artifact::{ArtifactConfig, build_artifact_store};
use semgrade::config::Config;
use semgrade::gateway::{AppState, create_router};
use semgrade::grading::BatchScorer;
use semgrade::model_cache::{ModelCache, ModelCacheConfig};
use semgrade::scoring::SimilarityScorer;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    let artifact_config = ArtifactConfig::from_env()?;
    let cache_config = ModelCacheConfig::from_env()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        provider = ?artifact_config.provider,
        model_prefix = %cache_config.bundle_prefix,
        model_dir = %cache_config.local_dir.display(),
        calibration = %config.calibration,
        "semgrade starting"
    );
    if cache_config.encoder.testing_stub {
        tracing::warn!("SEMGRADE_STUB_MODEL set, scores come from the hashed stub encoder");
    }

    let store = build_artifact_store(&artifact_config);
    let cache = ModelCache::new(cache_config, store);

    if config.warmup_on_start {
        let cache = cache.clone();
        tokio::spawn(async move {
            tracing::info!("Warming up model...");
            if let Err(e) = cache.ensure_ready().await {
                tracing::warn!("Model warm-up failed: {}. Will retry on first request.", e);
            }
        });
    }

    let scorer = BatchScorer::new(
        cache,
        SimilarityScorer::new(config.calibration),
        config.batch_parallelism,
    );
    let state = AppState::new(scorer, config.max_batch_size);
    let app = create_router(state, &config);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("semgrade shutdown complete");
    Ok(())
}

fn run_health_check() -> i32 {
    let port = std::env::var(Config::ENV_PORT)
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/healthz", port);

    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return 1;
    };

    rt.block_on(async {
        let Ok(client) = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
        else {
            return 1;
        };

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
