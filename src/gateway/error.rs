use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::SEMGRADE_STATUS_HEADER;

/// Request-level failures. Always rendered as `{"error": ..., "status": "error"}`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("batch of {size} answers exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: &'static str,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::InvalidRequest(_) | GatewayError::BatchTooLarge { .. } => {
                StatusCode::BAD_REQUEST
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(SEMGRADE_STATUS_HEADER, HeaderValue::from_static("error"));

        let body = Json(ErrorResponse {
            error: self.to_string(),
            status: "error",
        });

        (status, headers, body).into_response()
    }
}
