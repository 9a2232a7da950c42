//! localqa-cli
//!
//! Library half of the `localqa` binary: loading documents from disk and
//! rendering query results.
pub mod loader;
pub mod output;

pub use loader::DocumentLoader;
