use crate::grading::BatchScorer;
use crate::model_cache::ModelCache;

#[derive(Clone)]
pub struct AppState {
    pub scorer: BatchScorer,

    pub max_batch_size: usize,
}

impl AppState {
    pub fn new(scorer: BatchScorer, max_batch_size: usize) -> Self {
        Self {
            scorer,
            max_batch_size,
        }
    }

    pub fn model_cache(&self) -> &ModelCache {
        self.scorer.cache()
    }
}
