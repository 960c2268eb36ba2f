use std::sync::Arc;

use futures_util::{StreamExt, stream};
use serde_json::Value;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::error::GradingError;
use super::types::{AnswerPair, BatchResult, BatchStatus, RejectedItem, ScoreResult};
use crate::constants::{SCORE_DECIMALS, SIMILARITY_DECIMALS, round_to};
use crate::embedding::SentenceEncoder;
use crate::model_cache::ModelCache;
use crate::scoring::SimilarityScorer;

/// Scores a batch of answer pairs against the shared model.
///
/// Stateless between calls apart from the [`ModelCache`] warm state.
#[derive(Clone)]
pub struct BatchScorer {
    cache: ModelCache,
    scorer: SimilarityScorer,
    parallelism: usize,
}

impl BatchScorer {
    pub fn new(cache: ModelCache, scorer: SimilarityScorer, parallelism: usize) -> Self {
        Self {
            cache,
            scorer,
            parallelism: parallelism.max(1),
        }
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Scores `answers` in order.
    ///
    /// A model that cannot be made ready fails the batch; any other problem is
    /// confined to the item it came from.
    pub async fn score_batch(&self, answers: Vec<Value>) -> BatchResult {
        let batch_id = Uuid::new_v4();
        let span = info_span!("score_batch", %batch_id, items = answers.len());
        self.score_batch_inner(answers).instrument(span).await
    }

    async fn score_batch_inner(&self, answers: Vec<Value>) -> BatchResult {
        let items: Vec<Result<AnswerPair, RejectedItem>> =
            answers.iter().map(AnswerPair::from_value).collect();

        let needs_model = items
            .iter()
            .any(|item| matches!(item, Ok(pair) if !pair.is_unanswered()));
        let encoder = if needs_model {
            match self.cache.ensure_ready().await {
                Ok(encoder) => Some(encoder),
                Err(e) => {
                    let error = GradingError::from(e);
                    warn!(error = %error, "Batch failed");
                    return BatchResult::fatal(error);
                }
            }
        } else {
            None
        };

        let scorer = self.scorer;
        let results: Vec<ScoreResult> = stream::iter(items)
            .map(|item| {
                let encoder = encoder.clone();
                async move {
                    match item {
                        Ok(pair) => score_item(scorer, encoder, pair).await,
                        Err(rejected) => {
                            warn!(question_id = %rejected.question_id, error = %rejected.error, "Rejected answer item");
                            ScoreResult::failed(rejected)
                        }
                    }
                }
            })
            .buffered(self.parallelism)
            .collect()
            .await;

        let result = summarize(results);
        info!(
            status = ?result.status,
            total_score = result.total_score,
            total_max_score = result.total_max_score,
            "Batch scored"
        );
        result
    }
}

async fn score_item(
    scorer: SimilarityScorer,
    encoder: Option<Arc<SentenceEncoder>>,
    pair: AnswerPair,
) -> ScoreResult {
    let question_id = pair.question_id.clone();
    let max_score = pair.max_score;

    if pair.is_unanswered() {
        debug!(question_id = %question_id, "Unanswered question scored zero");
        return ScoreResult {
            question_id,
            similarity_score: 0.0,
            final_score: 0.0,
            max_score,
            error: None,
        };
    }

    let scored = match encoder {
        Some(encoder) => tokio::task::spawn_blocking(move || {
            scorer
                .score_pair(&encoder, &pair.key_answer, &pair.student_answer, pair.max_score)
                .map_err(GradingError::from)
        })
        .await
        .unwrap_or_else(|e| Err(GradingError::Aborted(e.to_string()))),
        None => Err(GradingError::Aborted("model not loaded".to_string())),
    };

    match scored {
        Ok(score) => {
            debug!(
                question_id = %question_id,
                similarity = score.similarity,
                final_score = score.final_score,
                "Scored answer"
            );
            ScoreResult {
                question_id,
                similarity_score: round_to(score.similarity, SIMILARITY_DECIMALS),
                final_score: score.final_score,
                max_score,
                error: None,
            }
        }
        Err(error) => {
            warn!(question_id = %question_id, error = %error, "Answer scoring failed");
            ScoreResult::failed(RejectedItem {
                question_id,
                max_score,
                error,
            })
        }
    }
}

/// Computes totals and status from ordered item results.
pub fn summarize(results: Vec<ScoreResult>) -> BatchResult {
    let failed = results.iter().filter(|r| r.is_failed()).count();
    let status = if failed == 0 {
        BatchStatus::Success
    } else if failed < results.len() {
        BatchStatus::Partial
    } else {
        BatchStatus::Error
    };

    let total_score = round_to(
        results.iter().map(|r| r.final_score).sum::<f64>(),
        SCORE_DECIMALS,
    );
    let total_max_score = results.iter().map(|r| r.max_score).sum::<f64>();

    BatchResult {
        results,
        total_score,
        total_max_score,
        status,
        error: None,
    }
}
