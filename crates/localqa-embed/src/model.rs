//! XLM-RoBERTa sentence embedder (BGE-M3 style checkpoints) running on candle.
//!
//! The model directory must contain `config.json`, `tokenizer.json` and either
//! `model.safetensors` or `pytorch_model.bin`.

use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{XLMRobertaModel, Config as XLMRobertaConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use localqa_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch;

pub struct CandleEmbedder {
    id: String,
    dim: usize,
    max_len: usize,
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl CandleEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        anyhow::ensure!(max_len > 0, "max_len must be greater than 0");
        let device = select_device();
        info!(model_dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;

        let name = model_dir.file_name().and_then(|n| n.to_str()).unwrap_or("model");
        let dim = config.hidden_size;
        info!(dim, max_len, "embedding model loaded");
        Ok(Self { id: format!("candle:{name}:d{dim}"), dim, max_len, model, tokenizer, device })
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors: PathBuf = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let weights = candle_core::pickle::read_all(&pickle)?;
        return Ok(weights.into_iter().collect());
    }
    Err(anyhow!("No model weights found in {}", model_dir.display()))
}

impl Embedder for CandleEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = Tensor::zeros(input_ids.dims(), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        anyhow::ensure!(vectors.iter().all(|v| v.len() == self.dim), "model produced vectors of unexpected length");

        let elapsed = start.elapsed();
        debug!(batch = texts.len(), elapsed_ms = elapsed.as_millis() as u64, "embedded batch");
        if elapsed.as_millis() > 100 * texts.len() as u128 {
            warn!(batch = texts.len(), elapsed_ms = elapsed.as_millis() as u64, "slow embedding");
        }
        Ok(vectors)
    }
}
