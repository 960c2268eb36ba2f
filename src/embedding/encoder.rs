use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use super::bert::{BertSentenceModel, Pooling, bundle_max_seq_len};
use super::config::EncoderConfig;
use super::device::select_device;
use super::error::EmbeddingError;
use super::utils::load_tokenizer;
use crate::constants::DEFAULT_MAX_SEQ_LEN;

enum EncoderBackend {
    Model {
        model: BertSentenceModel,
        tokenizer: Tokenizer,
        device: Device,
    },
    Stub,
}

/// Sentence encoder loaded from a materialized model bundle (supports stub mode).
///
/// Inference takes `&self`; one instance is shared by every in-flight request.
pub struct SentenceEncoder {
    backend: EncoderBackend,
    embedding_dim: usize,
    max_seq_len: usize,
    source: PathBuf,
}

impl std::fmt::Debug for SentenceEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentenceEncoder")
            .field(
                "backend",
                &match &self.backend {
                    EncoderBackend::Model { device, model, .. } => {
                        format!("Model({:?}, {:?})", device, model.pooling())
                    }
                    EncoderBackend::Stub => "Stub".to_string(),
                },
            )
            .field("embedding_dim", &self.embedding_dim)
            .field("max_seq_len", &self.max_seq_len)
            .field("source", &self.source)
            .finish()
    }
}

impl SentenceEncoder {
    /// Loads the encoder from a complete bundle directory.
    pub fn load(bundle_dir: &Path, config: &EncoderConfig) -> Result<Self, EmbeddingError> {
        let max_seq_len = config
            .max_seq_len
            .or_else(|| bundle_max_seq_len(bundle_dir))
            .unwrap_or(DEFAULT_MAX_SEQ_LEN);

        if config.testing_stub {
            warn!(source = %bundle_dir.display(), "Encoder running in STUB mode (testing only)");
            return Ok(Self {
                backend: EncoderBackend::Stub,
                embedding_dim: config.stub_dim,
                max_seq_len,
                source: bundle_dir.to_path_buf(),
            });
        }

        let device = select_device()?;
        let model = BertSentenceModel::load(bundle_dir, &device)?;
        let tokenizer = load_tokenizer(bundle_dir, max_seq_len).map_err(|e| {
            EmbeddingError::TokenizationFailed {
                reason: format!("Failed to load tokenizer: {}", e),
            }
        })?;

        info!(
            source = %bundle_dir.display(),
            hidden_size = model.hidden_size(),
            pooling = ?model.pooling(),
            max_seq_len,
            "Sentence encoder loaded"
        );

        Ok(Self {
            embedding_dim: model.hidden_size(),
            backend: EncoderBackend::Model {
                model,
                tokenizer,
                device,
            },
            max_seq_len,
            source: bundle_dir.to_path_buf(),
        })
    }

    /// Creates a stub encoder not backed by any files.
    pub fn stub(embedding_dim: usize) -> Self {
        Self {
            backend: EncoderBackend::Stub,
            embedding_dim,
            max_seq_len: DEFAULT_MAX_SEQ_LEN,
            source: PathBuf::new(),
        }
    }

    /// Embeds one text into an L2-normalized vector of [`embedding_dim`](Self::embedding_dim) floats.
    ///
    /// Blank text is rejected with [`EmbeddingError::InvalidInput`].
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput {
                reason: "text must not be empty".to_string(),
            });
        }

        let raw = match &self.backend {
            EncoderBackend::Model {
                model,
                tokenizer,
                device,
            } => embed_with_model(text, model, tokenizer, device)?,
            EncoderBackend::Stub => embed_stub(text, self.embedding_dim),
        };

        Ok(l2_normalize(raw))
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    pub fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    pub fn is_stub(&self) -> bool {
        matches!(self.backend, EncoderBackend::Stub)
    }

    /// Directory the encoder was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn pooling(&self) -> Option<Pooling> {
        match &self.backend {
            EncoderBackend::Model { model, .. } => Some(model.pooling()),
            EncoderBackend::Stub => None,
        }
    }
}

fn embed_with_model(
    text: &str,
    model: &BertSentenceModel,
    tokenizer: &Tokenizer,
    device: &Device,
) -> Result<Vec<f32>, EmbeddingError> {
    let encoding =
        tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::TokenizationFailed {
                reason: e.to_string(),
            })?;

    debug!(
        text_len = text.len(),
        token_count = encoding.get_ids().len(),
        "Encoding text"
    );

    let input_ids = Tensor::new(encoding.get_ids(), device)?.unsqueeze(0)?;
    let type_ids = Tensor::new(encoding.get_type_ids(), device)?.unsqueeze(0)?;
    let attention_mask = Tensor::new(encoding.get_attention_mask(), device)?.unsqueeze(0)?;

    let pooled = model
        .forward_pooled(&input_ids, &type_ids, &attention_mask)
        .map_err(|e| EmbeddingError::InferenceFailed {
            reason: format!("Encoder forward pass failed: {}", e),
        })?;

    Ok(pooled.squeeze(0)?.to_vec1::<f32>()?)
}

/// Hashed bag-of-words vector: each lowercase word adds ±1 to a blake3-chosen bucket.
///
/// Texts sharing vocabulary land close together, which keeps stub-mode scores meaningful.
fn embed_stub(text: &str, dim: usize) -> Vec<f32> {
    let mut embedding = vec![0.0f32; dim];
    let lowered = text.to_lowercase();
    let mut words = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .peekable();

    if words.peek().is_none() {
        add_hashed_feature(&mut embedding, lowered.trim());
        return embedding;
    }
    for word in words {
        add_hashed_feature(&mut embedding, word);
    }
    embedding
}

fn add_hashed_feature(embedding: &mut [f32], feature: &str) {
    if embedding.is_empty() {
        return;
    }
    let hash = blake3::hash(feature.as_bytes());
    let bytes = hash.as_bytes();
    let mut bucket_bytes = [0u8; 8];
    bucket_bytes.copy_from_slice(&bytes[..8]);
    let bucket = (u64::from_le_bytes(bucket_bytes) % embedding.len() as u64) as usize;
    let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
    embedding[bucket] += sign;
}

fn l2_normalize(mut embedding: Vec<f32>) -> Vec<f32> {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut embedding {
            *x /= norm;
        }
    }
    embedding
}
