//! localqa-text
//!
//! Lexical indexes over chunks: an in-memory BM25 implementation with tunable
//! `k1`/`b` and a tantivy-backed alternative. Both share the analyzer in
//! `tantivy_utils`.
pub mod tantivy_utils;
pub mod bm25;
pub mod index;

pub use bm25::{Bm25Index, Bm25Params};
pub use index::TantivyIndex;

use localqa_core::config::{expand_path, LexicalBackend, LexicalConfig, DEFAULT_B, DEFAULT_K1};
use localqa_core::error::Result;
use localqa_core::traits::LexicalIndex;
use tracing::{info, warn};

/// Build the lexical backend selected by `config`.
pub fn lexical_index_from_config(config: &LexicalConfig) -> Result<Box<dyn LexicalIndex>> {
	config.validate()?;
	match config.backend {
		LexicalBackend::Bm25 => {
			info!(k1 = config.k1, b = config.b, "lexical backend: bm25");
			Ok(Box::new(Bm25Index::new(Bm25Params::from(config))))
		}
		LexicalBackend::Tantivy => {
			if config.k1 != DEFAULT_K1 || config.b != DEFAULT_B {
				warn!(k1 = config.k1, b = config.b, "tantivy backend ignores lexical.k1 and lexical.b");
			}
			let index = match config.index_dir.as_deref() {
				Some(dir) => {
					let dir = expand_path(dir);
					info!(index_dir = %dir.display(), "lexical backend: tantivy");
					TantivyIndex::create_in_dir(&dir)?
				}
				None => {
					info!("lexical backend: tantivy (in RAM)");
					TantivyIndex::in_ram()?
				}
			};
			Ok(Box::new(index))
		}
	}
}
