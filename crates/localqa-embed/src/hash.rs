use std::hash::Hasher;

use anyhow::Result;
use twox_hash::XxHash64;

use localqa_core::traits::Embedder;

/// Feature-hashing embedder: every lowercase alphanumeric token lands in one of
/// `dim` buckets with a signed weight derived from its xxHash64, and the sum is
/// L2-normalized.
///
/// No model files are needed, so it backs tests and offline setups without a
/// downloaded checkpoint. Texts sharing words get similar vectors; texts
/// without any token embed to the zero vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    id: String,
    dim: usize,
    max_len: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize, max_len: usize) -> Result<Self> {
        anyhow::ensure!(dim > 0, "embedding dimension must be greater than 0");
        anyhow::ensure!(max_len > 0, "max_len must be greater than 0");
        Ok(Self { id: format!("hash:xxh64:d{dim}"), dim, max_len })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .take(self.max_len);
        for token in tokens {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.to_lowercase().as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let magnitude = 0.5 + 0.5 * (((h >> 32) as u32) as f32 / u32::MAX as f32);
            let sign = if h >> 63 == 1 { -1.0 } else { 1.0 };
            v[idx] += sign * magnitude;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashEmbedder {
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
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
