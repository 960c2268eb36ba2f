//! Batch scoring of exam answers.
//!
//! Item failures are isolated (the item scores zero and carries an `error`);
//! an unavailable model fails the whole batch with status `"error"`.

pub mod error;
pub mod handler;
pub mod types;


pub use error::GradingError;
pub use handler::{BatchScorer, summarize};
pub use types::{AnswerPair, BatchResult, BatchStatus, RejectedItem, ScoreResult};
