//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary constants from primary ones to avoid drift.

/// Hidden size of the MiniLM-family sentence encoders this service ships with.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Token budget used when the bundle carries no `sentence_bert_config.json`.
pub const DEFAULT_MAX_SEQ_LEN: usize = 256;

/// Storage prefix of the model bundle inside the artifact store.
pub const DEFAULT_MODEL_PREFIX: &str = "models/answer-scoring-model";

/// Directory name (under the system temp dir) the bundle is materialized into.
pub const DEFAULT_MODEL_DIR_NAME: &str = "semgrade-model";

/// Decimal places kept on `final_score` / `total_score`.
pub const SCORE_DECIMALS: i32 = 2;

/// Decimal places kept on the reported `similarity_score`.
pub const SIMILARITY_DECIMALS: i32 = 4;

/// Overall wall-clock budget for one scoring request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Largest batch accepted by the HTTP entry point.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 200;

/// Number of answer pairs embedded concurrently within one batch.
pub const DEFAULT_BATCH_PARALLELISM: usize = 4;

/// Rounds `value` to `decimals` places (half away from zero).
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
