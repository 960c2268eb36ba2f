use crate::constants::DEFAULT_EMBEDDING_DIM;

#[derive(Debug, Clone)]
/// Configuration for [`SentenceEncoder`](super::SentenceEncoder).
pub struct EncoderConfig {
    /// Token budget override. `None` uses the bundle's `sentence_bert_config.json`.
    pub max_seq_len: Option<usize>,
    /// Output dimension in stub mode (model mode uses the model's hidden size).
    pub stub_dim: usize,
    /// If true, skip weight loading and produce deterministic hashed embeddings.
    pub testing_stub: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            max_seq_len: None,
            stub_dim: DEFAULT_EMBEDDING_DIM,
            testing_stub: false,
        }
    }
}

impl EncoderConfig {
    /// Env var enabling stub mode.
    pub const ENV_STUB_MODEL: &'static str = "SEMGRADE_STUB_MODEL";
    /// Env var overriding the token budget.
    pub const ENV_MAX_SEQ_LEN: &'static str = "SEMGRADE_MAX_SEQ_LEN";

    /// Loads config from environment variables (with defaults).
    pub fn from_env() -> Self {
        let testing_stub = std::env::var(Self::ENV_STUB_MODEL)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let max_seq_len = std::env::var(Self::ENV_MAX_SEQ_LEN)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .filter(|n: &usize| *n > 0);

        Self {
            max_seq_len,
            testing_stub,
            ..Default::default()
        }
    }

    /// Creates a stub config (no weights are read).
    pub fn stub() -> Self {
        Self {
            testing_stub: true,
            ..Default::default()
        }
    }
}
