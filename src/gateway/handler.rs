use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::{debug, instrument};

use super::SEMGRADE_STATUS_HEADER;
use super::error::GatewayError;
use super::state::AppState;
use crate::grading::BatchStatus;

/// `POST /score_exam`.
///
/// The body is parsed here rather than through the `Json` extractor so that every
/// rejection uses the service's own error shape.
#[instrument(skip(state, body), fields(body_len = body.len(), answers = tracing::field::Empty))]
pub async fn score_exam_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let answers = parse_answers(&body)?;
    tracing::Span::current().record("answers", answers.len());

    if answers.len() > state.max_batch_size {
        return Err(GatewayError::BatchTooLarge {
            size: answers.len(),
            max: state.max_batch_size,
        });
    }

    let result = state.scorer.score_batch(answers).await;

    // A batch-level error means the model never became ready.
    let status_code = if result.status == BatchStatus::Error && result.error.is_some() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    debug!(status = ?result.status, http_status = %status_code, "Exam scored");

    let status_label = match result.status {
        BatchStatus::Success => "success",
        BatchStatus::Partial => "partial",
        BatchStatus::Error => "error",
    };
    let mut headers = HeaderMap::new();
    headers.insert(SEMGRADE_STATUS_HEADER, HeaderValue::from_static(status_label));

    Ok((status_code, headers, Json(result)).into_response())
}

fn parse_answers(body: &[u8]) -> Result<Vec<Value>, GatewayError> {
    let request: Value = serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("malformed JSON body: {}", e)))?;

    let Value::Object(mut fields) = request else {
        return Err(GatewayError::InvalidRequest(
            "request body must be a JSON object".to_string(),
        ));
    };

    match fields.remove("answers") {
        Some(Value::Array(answers)) => Ok(answers),
        None | Some(Value::Null) => Err(GatewayError::InvalidRequest(
            "missing 'answers' in request body".to_string(),
        )),
        Some(_) => Err(GatewayError::InvalidRequest(
            "'answers' must be an array".to_string(),
        )),
    }
}
