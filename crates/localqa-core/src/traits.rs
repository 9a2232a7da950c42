use crate::error::Result;
use crate::types::{Chunk, ChunkId, SearchHit};

/// Produces fixed-length vectors for text.
///
/// Implementations must be deterministic for a given model version and always
/// return vectors of length [`Embedder::dim`].
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `hash:xxh64:d384`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Term-based ranking structure over chunks.
///
/// Results are ordered by descending score with ties broken by chunk id.
pub trait LexicalIndex: Send + Sync {
    /// Index `chunks`, replacing any chunk whose id is already present.
    fn add(&mut self, chunks: &[Chunk]) -> Result<()>;
    /// Drop every chunk of `document_id`; unknown ids are a no-op.
    fn remove(&mut self, document_id: &str) -> Result<usize>;
    fn remove_chunks(&mut self, ids: &[ChunkId]) -> Result<usize>;
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Nearest-neighbour structure over chunk embeddings of a fixed dimension.
pub trait SemanticIndex: Send + Sync {
    fn dim(&self) -> usize;
    /// Store `vector` for `id`. Fails with `DimensionMismatch` without touching
    /// the index when the length differs from [`SemanticIndex::dim`].
    fn add(&mut self, id: &ChunkId, vector: Vec<f32>) -> Result<()>;
    fn remove(&mut self, document_id: &str) -> Result<usize>;
    fn remove_chunks(&mut self, ids: &[ChunkId]) -> Result<usize>;
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
