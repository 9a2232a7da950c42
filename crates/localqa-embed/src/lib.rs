//! localqa-embed
//!
//! Embedder implementations behind the `localqa_core::traits::Embedder` trait:
//! a dependency-free feature-hashing embedder and, with the `candle` feature,
//! a local transformer model.
mod hash;
pub use hash::HashEmbedder;

#[cfg(feature = "candle")]
mod device;
#[cfg(feature = "candle")]
mod model;
#[cfg(feature = "candle")]
mod pool;
#[cfg(feature = "candle")]
mod tokenize;

#[cfg(feature = "candle")]
pub use device::select_device;
#[cfg(feature = "candle")]
pub use model::CandleEmbedder;
#[cfg(feature = "candle")]
pub use pool::masked_mean_l2;
#[cfg(feature = "candle")]
pub use tokenize::tokenize_batch;

use std::sync::Arc;

use localqa_core::config::{EmbedderConfig, EmbedderKind};
use localqa_core::error::{Error, Result};
use localqa_core::traits::Embedder;
use tracing::info;

/// Build the embedder selected by `config`.
pub fn embedder_from_config(config: &EmbedderConfig) -> Result<Arc<dyn Embedder>> {
    match config.kind {
        EmbedderKind::Hash => {
            let embedder = HashEmbedder::new(config.dim, config.max_len).map_err(|e| Error::Config(e.to_string()))?;
            info!(id = embedder.id(), "embedder ready");
            Ok(Arc::new(embedder))
        }
        EmbedderKind::Candle => load_candle(config),
    }
}

#[cfg(feature = "candle")]
fn load_candle(config: &EmbedderConfig) -> Result<Arc<dyn Embedder>> {
    let dir = config
        .model_dir
        .as_deref()
        .ok_or_else(|| Error::Config("embedder.model_dir is required for the candle embedder".to_string()))?;
    let dir = localqa_core::config::expand_path(dir);
    let embedder = CandleEmbedder::load(&dir, config.max_len).map_err(Error::Embedder)?;
    info!(id = embedder.id(), "embedder ready");
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "candle"))]
fn load_candle(_config: &EmbedderConfig) -> Result<Arc<dyn Embedder>> {
    Err(Error::Config("embedder.kind = \"candle\" requires building with the `candle` feature".to_string()))
}
