//! Text embedding over the materialized model bundle.
//!
//! [`SentenceEncoder`] is the loaded, ready-to-infer model. It is built once by the
//! [`model_cache`](crate::model_cache) and shared read-only by every request.

/// BERT sentence model and bundle file layout.
pub mod bert;
/// Encoder configuration.
pub mod config;
/// Device selection (CPU / Metal / CUDA).
pub mod device;
pub mod encoder;
mod error;
/// Tokenizer loading helpers.
pub mod utils;


pub use bert::{
    CONFIG_FILE, POOLING_CONFIG_FILE, Pooling, SENTENCE_CONFIG_FILE, TOKENIZER_FILE, WEIGHT_FILES,
};
pub use config::EncoderConfig;
pub use encoder::SentenceEncoder;
pub use error::EmbeddingError;
