//! localqa-hybrid
//!
//! Fuses lexical and semantic retrieval. [`HybridEngine`] owns both indexes,
//! the chunk store and the embedder handle; [`FusionRanker`] merges the two
//! candidate lists.
pub mod engine;
pub mod fusion;

pub use engine::{format_context, EngineStats, HybridEngine, IngestReport};
pub use fusion::FusionRanker;
