use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Step of a document ingest that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Chunk,
    Embed,
    LexicalAdd,
    SemanticAdd,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Chunk => "chunk",
            Self::Embed => "embed",
            Self::LexicalAdd => "lexical add",
            Self::SemanticAdd => "semantic add",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index is empty: no documents have been ingested")]
    EmptyIndex,

    #[error("No results matched the query")]
    NoResults,

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Ingest of '{document_id}' failed at {stage}; previous state kept")]
    PartialIngestFailure {
        document_id: String,
        stage: IngestStage,
        #[source]
        source: Box<Error>,
    },

    #[error("Embedder failed: {0}")]
    Embedder(#[source] anyhow::Error),

    #[error("Index backend failed: {0}")]
    Index(#[source] anyhow::Error),
}

impl Error {
    /// Wrap `self` as the cause of a failed ingest step.
    pub fn during_ingest(self, document_id: impl Into<String>, stage: IngestStage) -> Self {
        Self::PartialIngestFailure { document_id: document_id.into(), stage, source: Box::new(self) }
    }

    /// True for the two "nothing to return" states, which callers usually render
    /// as an empty answer rather than a failure.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::EmptyIndex | Self::NoResults)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
