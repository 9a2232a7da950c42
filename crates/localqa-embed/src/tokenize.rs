use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// XLM-RoBERTa's `<pad>` id, used when the tokenizer has no padding configured.
const DEFAULT_PAD_ID: u32 = 1;

/// Tokenize a batch, truncating to `max_len` and right-padding to the longest
/// sequence. Returns `(input_ids, attention_mask)`, both `[B,T]`.
pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let encodings = tokenizer.encode_batch(texts.to_vec(), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let pad_id = tokenizer.get_padding().map_or(DEFAULT_PAD_ID, |p| p.pad_id);
    let width = encodings.iter().map(|e| e.get_ids().len().min(max_len)).max().unwrap_or(0).max(1);

    let mut ids = Vec::with_capacity(texts.len() * width);
    let mut mask = Vec::with_capacity(texts.len() * width);
    for enc in &encodings {
        let n = enc.get_ids().len().min(max_len);
        ids.extend_from_slice(&enc.get_ids()[..n]);
        mask.extend_from_slice(&enc.get_attention_mask()[..n]);
        ids.extend(std::iter::repeat(pad_id).take(width - n));
        mask.extend(std::iter::repeat(0).take(width - n));
    }
    let input_ids = Tensor::from_vec(ids, (texts.len(), width), device)?;
    let attention_mask = Tensor::from_vec(mask, (texts.len(), width), device)?;
    Ok((input_ids, attention_mask))
}
