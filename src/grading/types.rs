use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::GradingError;

#[derive(Debug, Clone, PartialEq)]
/// One validated answer pair. Text fields are trimmed; `max_score` is finite and positive.
pub struct AnswerPair {
    pub question_id: Value,
    pub key_answer: String,
    pub student_answer: String,
    pub max_score: f64,
}

#[derive(Debug, Clone)]
/// An item that failed validation, with what could still be recovered from it.
pub struct RejectedItem {
    pub question_id: Value,
    /// The item's `max_score` if it was a valid positive number, else `0`.
    pub max_score: f64,
    pub error: GradingError,
}

impl AnswerPair {
    /// Validates one raw request item.
    ///
    /// `question_id` is opaque and echoed back unchanged (`null` when absent). A blank
    /// `student_answer` is valid (unanswered); a blank `key_answer` is not.
    pub fn from_value(item: &Value) -> Result<Self, RejectedItem> {
        let Some(obj) = item.as_object() else {
            return Err(RejectedItem {
                question_id: Value::Null,
                max_score: 0.0,
                error: GradingError::invalid("answer item must be a JSON object"),
            });
        };

        let question_id = obj.get("question_id").cloned().unwrap_or(Value::Null);
        let max_score = obj.get("max_score").and_then(Value::as_f64);
        let valid_max = max_score.filter(|m| m.is_finite() && *m > 0.0);

        let reject = |error: GradingError| RejectedItem {
            question_id: question_id.clone(),
            max_score: valid_max.unwrap_or(0.0),
            error,
        };

        let key_answer = text_field(obj, "key_answer").map_err(reject)?;
        let student_answer = text_field(obj, "student_answer").map_err(reject)?;

        if key_answer.is_empty() {
            return Err(reject(GradingError::invalid("key_answer is empty")));
        }
        let Some(max_score) = valid_max else {
            let reason = match obj.get("max_score") {
                None | Some(Value::Null) => "max_score is required".to_string(),
                Some(v) if !v.is_number() => "max_score must be a number".to_string(),
                Some(v) => format!("max_score must be a positive number, got {v}"),
            };
            return Err(reject(GradingError::InvalidInput(reason)));
        };

        Ok(Self {
            question_id,
            key_answer,
            student_answer,
            max_score,
        })
    }

    /// True when the student left the question blank.
    pub fn is_unanswered(&self) -> bool {
        self.student_answer.is_empty()
    }
}

fn text_field(obj: &serde_json::Map<String, Value>, name: &str) -> Result<String, GradingError> {
    match obj.get(name) {
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        None | Some(Value::Null) => Err(GradingError::invalid(format!("{name} is required"))),
        Some(_) => Err(GradingError::invalid(format!("{name} must be a string"))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Per-item score, in request order.
pub struct ScoreResult {
    pub question_id: Value,
    /// Raw cosine similarity, four decimals. May fall outside `[0, 1]`.
    pub similarity_score: f64,
    /// Calibrated grade in `[0, max_score]`, two decimals.
    pub final_score: f64,
    pub max_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScoreResult {
    pub fn failed(rejected: RejectedItem) -> Self {
        Self {
            question_id: rejected.question_id,
            similarity_score: 0.0,
            final_score: 0.0,
            max_score: rejected.max_score,
            error: Some(rejected.error.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Partial,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Response body of one scoring request.
pub struct BatchResult {
    pub results: Vec<ScoreResult>,
    pub total_score: f64,
    pub total_max_score: f64,
    pub status: BatchStatus,
    /// Batch-level failure (model unavailable). Absent otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResult {
    /// A batch that produced no results because of `error`.
    pub fn fatal(error: impl std::fmt::Display) -> Self {
        Self {
            results: Vec::new(),
            total_score: 0.0,
            total_max_score: 0.0,
            status: BatchStatus::Error,
            error: Some(error.to_string()),
        }
    }
}
