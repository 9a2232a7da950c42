//! localqa-core
//!
//! Shared domain types, the error taxonomy, the index/embedder traits,
//! configuration, and the chunker used by every other localqa crate.

pub mod chunker;
pub mod config;
pub mod error;
pub mod preprocess;
pub mod traits;
pub mod types;

pub use chunker::Chunker;
pub use error::{Error, IngestStage, Result};
