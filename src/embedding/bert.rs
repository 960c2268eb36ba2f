use std::path::{Path, PathBuf};

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use serde::Deserialize;
use tracing::debug;

use super::error::EmbeddingError;

/// Model config file (required).
pub const CONFIG_FILE: &str = "config.json";
/// Tokenizer file (required).
pub const TOKENIZER_FILE: &str = "tokenizer.json";
/// Accepted weight files, in order of preference (one is required).
pub const WEIGHT_FILES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];
/// Optional sentence-transformers pooling module config.
pub const POOLING_CONFIG_FILE: &str = "1_Pooling/config.json";
/// Optional sentence-transformers top-level config (carries `max_seq_length`).
pub const SENTENCE_CONFIG_FILE: &str = "sentence_bert_config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// How token states are reduced to one sentence vector.
pub enum Pooling {
    #[default]
    Mean,
    Cls,
}

#[derive(Deserialize)]
struct PoolingFile {
    #[serde(default)]
    pooling_mode_cls_token: bool,
    #[serde(default)]
    pooling_mode_mean_tokens: bool,
}

#[derive(Deserialize)]
struct SentenceBertFile {
    max_seq_length: Option<usize>,
}

impl Pooling {
    /// Reads `1_Pooling/config.json`; a missing or unreadable file means mean pooling.
    pub fn from_bundle(dir: &Path) -> Self {
        let Ok(raw) = std::fs::read_to_string(dir.join(POOLING_CONFIG_FILE)) else {
            return Self::default();
        };
        match serde_json::from_str::<PoolingFile>(&raw) {
            Ok(file) if file.pooling_mode_cls_token && !file.pooling_mode_mean_tokens => Self::Cls,
            Ok(_) => Self::Mean,
            Err(e) => {
                debug!(error = %e, "Unparseable pooling config, using mean pooling");
                Self::default()
            }
        }
    }
}

/// Reads `max_seq_length` from `sentence_bert_config.json`, if present.
pub fn bundle_max_seq_len(dir: &Path) -> Option<usize> {
    let raw = std::fs::read_to_string(dir.join(SENTENCE_CONFIG_FILE)).ok()?;
    serde_json::from_str::<SentenceBertFile>(&raw)
        .ok()?
        .max_seq_length
        .filter(|n| *n > 0)
}

/// Returns the first weight file present in `dir`.
pub fn find_weights(dir: &Path) -> Option<PathBuf> {
    WEIGHT_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// BERT encoder with sentence pooling over the last hidden layer.
pub struct BertSentenceModel {
    bert: BertModel,
    pooling: Pooling,
    hidden_size: usize,
}

impl BertSentenceModel {
    pub fn load(dir: &Path, device: &Device) -> Result<Self, EmbeddingError> {
        let config_path = dir.join(CONFIG_FILE);
        let config_content = std::fs::read_to_string(&config_path).map_err(|_| {
            EmbeddingError::ModelNotFound {
                path: config_path.clone(),
            }
        })?;
        let config: Config =
            serde_json::from_str(&config_content).map_err(|e| EmbeddingError::ModelLoadFailed {
                reason: format!("Failed to parse {}: {}", CONFIG_FILE, e),
            })?;

        let weights_path = find_weights(dir).ok_or_else(|| EmbeddingError::ModelNotFound {
            path: dir.join(WEIGHT_FILES[0]),
        })?;

        let vb = if weights_path.extension().is_some_and(|ext| ext == "safetensors") {
            // SAFETY: bundle files are never written in place. A replaced bundle is
            // unlinked, which keeps the mapped inode alive.
            unsafe { VarBuilder::from_mmaped_safetensors(&[&weights_path], DType::F32, device)? }
        } else {
            VarBuilder::from_pth(&weights_path, DType::F32, device)?
        };

        // sentence-transformers exports drop the `bert.` prefix; HF checkpoints keep it.
        let bert = if vb.contains_tensor("bert.embeddings.word_embeddings.weight") {
            BertModel::load(vb.pp("bert"), &config)?
        } else {
            BertModel::load(vb, &config)?
        };

        Ok(Self {
            bert,
            pooling: Pooling::from_bundle(dir),
            hidden_size: config.hidden_size,
        })
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn pooling(&self) -> Pooling {
        self.pooling
    }

    /// Runs the encoder and pools to `[batch, hidden]`.
    pub fn forward_pooled(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> candle_core::Result<Tensor> {
        let hidden = self
            .bert
            .forward(input_ids, token_type_ids, Some(attention_mask))?;

        match self.pooling {
            Pooling::Cls => hidden.i((.., 0, ..)),
            Pooling::Mean => {
                // [batch, seq, 1] so padding positions contribute nothing.
                let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
                let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
                let counts = mask.sum(1)?;
                summed.broadcast_div(&counts)
            }
        }
    }
}
