//! localqa-vector
//!
//! In-memory semantic indexes over chunk embeddings.
//!
//! - [`FlatIndex`]: exact scan, the default
//! - [`IvfIndex`]: k-means partitioned lists for larger collections
mod flat;
mod ivf;
pub mod metric;

pub use flat::FlatIndex;
pub use ivf::{compute_ivf_params, IvfIndex, IvfParams};

use localqa_core::config::{IndexStructure, SemanticConfig};
use localqa_core::error::Result;
use localqa_core::traits::SemanticIndex;
use tracing::info;

/// Build the semantic index selected by `config` for vectors of length `dim`.
pub fn semantic_index_from_config(config: &SemanticConfig, dim: usize) -> Result<Box<dyn SemanticIndex>> {
    config.validate()?;
    info!(dim, structure = ?config.structure, metric = ?config.metric, "semantic index");
    Ok(match config.structure {
        IndexStructure::Flat => Box::new(FlatIndex::new(dim, config.metric).with_min_score(config.min_score)),
        IndexStructure::Ivf => Box::new(IvfIndex::new(dim, config.metric, config.ivf.clone()).with_min_score(config.min_score)),
    })
}
