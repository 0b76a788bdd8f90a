use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

use docqa_core::{Error, Result};

const PAD_ID: u32 = 1;

/// Encode a batch of texts into `[B, max_len]` id and mask tensors, truncating
/// or padding each row to `max_len`.
pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let mut ids = Vec::with_capacity(texts.len() * max_len);
    let mut mask = Vec::with_capacity(texts.len() * max_len);
    for text in texts {
        let enc = tokenizer
            .encode(text.as_str(), true)
            .map_err(|e| Error::EmbeddingUnavailable(format!("tokenization failed: {e}")))?;
        let mut row_ids = enc.get_ids().to_vec();
        let mut row_mask = enc.get_attention_mask().to_vec();
        row_ids.resize(max_len, PAD_ID);
        row_mask.resize(max_len, 0);
        ids.extend(row_ids);
        mask.extend(row_mask);
    }
    let shape = (texts.len(), max_len);
    let input_ids = Tensor::from_vec(ids, shape, device).map_err(model_err)?;
    let attention_mask = Tensor::from_vec(mask, shape, device).map_err(model_err)?;
    Ok((input_ids, attention_mask))
}

pub(crate) fn model_err(e: candle_core::Error) -> Error {
    Error::EmbeddingUnavailable(format!("local model error: {e}"))
}
