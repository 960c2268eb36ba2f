//! HTTP gateway (Axum) exposing the scoring entry point.

pub mod error;
pub mod handler;
pub mod state;

#[cfg(test)]
mod tests;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use error::GatewayError;
pub use handler::score_exam_handler;
pub use state::AppState;

use crate::config::Config;
use crate::model_cache::ModelStatus;

/// Response header carrying the outcome (`success`, `partial`, `error`, `ready`, ...).
pub const SEMGRADE_STATUS_HEADER: &str = "x-semgrade-status";

pub fn create_router(state: AppState, config: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/score_exam", post(score_exam_handler))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub model: ModelStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dim: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stub: Option<bool>,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(SEMGRADE_STATUS_HEADER, HeaderValue::from_static("healthy"));

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}

/// 200 only once the model is loaded. Does not trigger loading.
#[tracing::instrument(skip(state))]
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let cache = state.model_cache();
    let model = cache.status();
    let encoder = cache.get();

    let (status_code, status_msg) = if model == ModelStatus::Ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "pending")
    };

    let mut headers = HeaderMap::new();
    headers.insert(SEMGRADE_STATUS_HEADER, HeaderValue::from_static(status_msg));

    (
        status_code,
        headers,
        Json(ReadyResponse {
            status: status_msg,
            model,
            embedding_dim: encoder.as_ref().map(|e| e.embedding_dim()),
            stub: encoder.as_ref().map(|e| e.is_stub()),
        }),
    )
        .into_response()
}
