use std::io;
use std::path::Path;

use tokenizers::{Tokenizer, TruncationParams};

use super::bert::TOKENIZER_FILE;

/// Loads `tokenizer.json` from a bundle directory with truncation to `max_len` tokens.
pub fn load_tokenizer(bundle_dir: &Path, max_len: usize) -> io::Result<Tokenizer> {
    let mut tokenizer =
        Tokenizer::from_file(bundle_dir.join(TOKENIZER_FILE)).map_err(io::Error::other)?;

    let truncation = TruncationParams {
        max_length: max_len,
        ..Default::default()
    };
    tokenizer
        .with_truncation(Some(truncation))
        .map_err(|e| io::Error::other(format!("Failed to configure truncation: {}", e)))?;

    Ok(tokenizer)
}
