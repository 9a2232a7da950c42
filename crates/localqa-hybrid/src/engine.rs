//! Retrieval orchestrator: chunking, embedding, dual indexing and fused queries.
//!
//! Both indexes and the chunk store sit behind one `RwLock`. Queries take a
//! read guard for the whole search so they always see both indexes at the same
//! version; ingest computes embeddings first and only then takes the write
//! guard for a short synchronous mutation.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use localqa_core::config::EngineConfig;
use localqa_core::error::{Error, IngestStage, Result};
use localqa_core::traits::{Embedder, LexicalIndex, SemanticIndex};
use localqa_core::types::{ensure_k, Chunk, ChunkId, Document, DocumentId, FusedHit, RetrievedChunk, SearchHit, CATEGORY_KEY};
use localqa_core::Chunker;
use localqa_embed::embedder_from_config;
use localqa_text::lexical_index_from_config;
use localqa_vector::semantic_index_from_config;

use crate::fusion::FusionRanker;

const EMBED_BATCH: usize = 32;
/// Attempts made against both indexes before a removal is given up on.
const REMOVE_ATTEMPTS: usize = 2;

/// Outcome of [`HybridEngine::ingest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub document_id: DocumentId,
    pub chunks_added: usize,
    pub chunks_removed: usize,
    /// The same content was already indexed; nothing changed.
    pub unchanged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub documents: usize,
    pub chunks: usize,
    pub lexical_entries: usize,
    pub semantic_entries: usize,
    /// Chunks dropped from the store whose index entries are still awaiting removal.
    pub pending_removals: usize,
    pub embedder_id: String,
    pub dim: usize,
}

struct DocumentEntry {
    version: String,
    chunk_ids: Vec<ChunkId>,
    document: Document,
}

struct IndexState {
    lexical: Box<dyn LexicalIndex>,
    semantic: Box<dyn SemanticIndex>,
    chunks: HashMap<ChunkId, Chunk>,
    documents: BTreeMap<DocumentId, DocumentEntry>,
    pending: BTreeSet<ChunkId>,
}

impl IndexState {
    fn unchanged(&self, document_id: &str, version: &str) -> bool {
        self.documents.get(document_id).is_some_and(|e| e.version == version)
    }

    /// Remove `ids` from both indexes, retrying the pair on failure.
    /// Removal is idempotent, so repeating the index that already succeeded is safe.
    fn remove_from_indexes(&mut self, ids: &[ChunkId]) -> Result<()> {
        let mut attempt = 1;
        loop {
            let result = self.lexical.remove_chunks(ids).and_then(|_| self.semantic.remove_chunks(ids));
            match result {
                Ok(_) => return Ok(()),
                Err(e) if attempt < REMOVE_ATTEMPTS => {
                    debug!(chunks = ids.len(), attempt, error = %e, "index removal failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Retry removals left over from earlier mutations.
    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let ids: Vec<ChunkId> = self.pending.iter().cloned().collect();
        match self.remove_from_indexes(&ids) {
            Ok(()) => {
                debug!(chunks = ids.len(), "pending removals flushed");
                self.pending.clear();
            }
            Err(e) => warn!(chunks = ids.len(), error = %e, "pending removals still failing"),
        }
    }

    /// Add the new chunks to both indexes, then retire the previous ones.
    /// Any failure while adding removes what this attempt added.
    fn apply(&mut self, document: Document, version: String, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<IngestReport> {
        let document_id = document.id.clone();
        if self.unchanged(&document_id, &version) {
            return Ok(IngestReport { document_id, chunks_added: 0, chunks_removed: 0, unchanged: true });
        }
        self.flush_pending();
        let new_ids: Vec<ChunkId> = chunks.iter().map(|c| c.id.clone()).collect();

        if let Err(e) = self.lexical.add(&chunks) {
            self.rollback(&document_id, &new_ids);
            return Err(e.during_ingest(document_id, IngestStage::LexicalAdd));
        }
        for (chunk, vector) in chunks.iter().zip(vectors) {
            if let Err(e) = self.semantic.add(&chunk.id, vector) {
                self.rollback(&document_id, &new_ids);
                return Err(e.during_ingest(document_id, IngestStage::SemanticAdd));
            }
        }

        // Re-added ids are live again and must not be swept by a later flush.
        for id in &new_ids {
            self.pending.remove(id);
        }
        let fresh: HashSet<&ChunkId> = new_ids.iter().collect();
        let stale: Vec<ChunkId> = self
            .documents
            .get(&document_id)
            .map(|e| e.chunk_ids.iter().filter(|id| !fresh.contains(id)).cloned().collect())
            .unwrap_or_default();
        if !stale.is_empty() {
            // The new version is fully indexed; stale chunks leave the store either
            // way and unremoved index entries are retried on the next mutation.
            if let Err(e) = self.remove_from_indexes(&stale) {
                warn!(document_id = %document_id, chunks = stale.len(), error = %e, "stale chunks kept for a later removal");
                self.pending.extend(stale.iter().cloned());
            }
            for id in &stale {
                self.chunks.remove(id);
            }
        }

        let chunks_added = chunks.len();
        for chunk in chunks {
            self.chunks.insert(chunk.id.clone(), chunk);
        }
        self.documents.insert(document_id.clone(), DocumentEntry { version, chunk_ids: new_ids, document });
        Ok(IngestReport { document_id, chunks_added, chunks_removed: stale.len(), unchanged: false })
    }

    fn rollback(&mut self, document_id: &str, ids: &[ChunkId]) {
        warn!(document_id, chunks = ids.len(), "ingest failed, rolling back");
        if let Err(e) = self.remove_from_indexes(ids) {
            warn!(document_id, error = %e, "rollback incomplete, removal deferred");
            self.pending.extend(ids.iter().cloned());
        }
    }

    /// Documents whose category is `category` or nested below it.
    fn in_category(&self, category: &str) -> HashSet<&DocumentId> {
        let nested = format!("{category}/");
        self.documents
            .iter()
            .filter(|(_, e)| {
                e.document.metadata.get(CATEGORY_KEY).is_some_and(|c| c == category || c.starts_with(&nested))
            })
            .map(|(id, _)| id)
            .collect()
    }

    fn retrieved(&self, hit: FusedHit) -> Option<RetrievedChunk> {
        let chunk = self.chunks.get(&hit.id)?.clone();
        let source = self
            .documents
            .get(&chunk.document_id)
            .map_or_else(|| chunk.document_id.clone(), |e| e.document.source_label().to_string());
        Some(RetrievedChunk { hit, source, chunk })
    }
}

pub struct HybridEngine {
    state: Arc<RwLock<IndexState>>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    fuser: FusionRanker,
    config: EngineConfig,
}

impl HybridEngine {
    /// Build the embedder and both indexes from `config`.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let embedder = embedder_from_config(&config.embedder)?;
        Self::new(config, embedder)
    }

    /// Build the configured lexical and semantic backends around `embedder`.
    pub fn new(config: EngineConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config.validate()?;
        let lexical = lexical_index_from_config(&config.lexical)?;
        let semantic = semantic_index_from_config(&config.semantic, embedder.dim())?;
        Self::with_indexes(config, embedder, lexical, semantic)
    }

    /// Use caller-provided index backends. Both must be empty.
    pub fn with_indexes(
        config: EngineConfig,
        embedder: Arc<dyn Embedder>,
        lexical: Box<dyn LexicalIndex>,
        semantic: Box<dyn SemanticIndex>,
    ) -> Result<Self> {
        config.validate()?;
        if semantic.dim() != embedder.dim() {
            return Err(Error::DimensionMismatch { expected: semantic.dim(), actual: embedder.dim() });
        }
        if !lexical.is_empty() || !semantic.is_empty() {
            return Err(Error::InvalidArgument("index backends must start empty".to_string()));
        }
        let chunker = Chunker::new(config.chunking.clone())?;
        let fuser = FusionRanker::new(config.fusion.clone())?;
        info!(embedder = embedder.id(), dim = embedder.dim(), "hybrid engine ready");
        let state = IndexState { lexical, semantic, chunks: HashMap::new(), documents: BTreeMap::new(), pending: BTreeSet::new() };
        Ok(Self { state: Arc::new(RwLock::new(state)), embedder, chunker, fuser, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        let count = texts.len();
        let vectors = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for batch in texts.chunks(EMBED_BATCH) {
                out.extend(embedder.embed_batch(batch)?);
            }
            Ok(out)
        })
        .await
        .map_err(|e| Error::Embedder(e.into()))?
        .map_err(Error::Embedder)?;
        if vectors.len() != count {
            return Err(Error::Embedder(anyhow::anyhow!("embedder returned {} vectors for {} texts", vectors.len(), count)));
        }
        Ok(vectors)
    }

    /// Index `document`, replacing any earlier version with the same id.
    ///
    /// Either every new chunk becomes visible to queries together with the
    /// removal of the old ones, or the previous state is kept and
    /// `PartialIngestFailure` is returned.
    pub async fn ingest(&self, document: Document) -> Result<IngestReport> {
        if document.id.trim().is_empty() {
            return Err(Error::InvalidArgument("document id must not be blank".to_string()));
        }
        let document_id = document.id.clone();
        let version = document.version();
        if self.state.read().await.unchanged(&document_id, &version) {
            debug!(document_id = %document_id, "document unchanged, skipping");
            return Ok(IngestReport { document_id, chunks_added: 0, chunks_removed: 0, unchanged: true });
        }

        let chunks = self.chunker.split(&document).map_err(|e| e.during_ingest(&document_id, IngestStage::Chunk))?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let prepare = async {
            let vectors = self.embed(texts).await.map_err(|e| e.during_ingest(&document_id, IngestStage::Embed))?;
            let guard = self.state.write().await;
            Ok::<_, Error>((vectors, guard))
        };
        let (vectors, mut state) = match self.config.ingest.timeout() {
            Some(limit) => tokio::time::timeout(limit, prepare).await.map_err(|_| Error::Timeout(limit))??,
            None => prepare.await?,
        };

        let report = state.apply(document, version, chunks, vectors)?;
        info!(
            document_id = %report.document_id,
            added = report.chunks_added,
            removed = report.chunks_removed,
            unchanged = report.unchanged,
            "ingested document"
        );
        Ok(report)
    }

    /// Top `k` chunks for `text`, fused from both indexes.
    ///
    /// Fails with `EmptyIndex` when nothing has been ingested and `NoResults`
    /// when neither index matched.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidArgument("query text must not be blank".to_string()));
        }
        ensure_k(k)?;
        self.with_query_timeout(self.run_query(text.to_string(), k, None)).await
    }

    /// Like [`HybridEngine::query`], restricted to documents whose `category`
    /// metadata equals `category` or lies below it (`garden` covers
    /// `garden/soil`). Both candidate lists are filtered before fusion.
    pub async fn query_category(&self, text: &str, k: usize, category: &str) -> Result<Vec<RetrievedChunk>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidArgument("query text must not be blank".to_string()));
        }
        let category = category.trim().trim_matches('/');
        if category.is_empty() {
            return Err(Error::InvalidArgument("category must not be blank".to_string()));
        }
        ensure_k(k)?;
        self.with_query_timeout(self.run_query(text.to_string(), k, Some(category.to_string()))).await
    }

    async fn with_query_timeout(&self, run: impl std::future::Future<Output = Result<Vec<RetrievedChunk>>>) -> Result<Vec<RetrievedChunk>> {
        match self.config.query.timeout() {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| Error::Timeout(limit))?,
            None => run.await,
        }
    }

    async fn run_query(&self, text: String, k: usize, category: Option<String>) -> Result<Vec<RetrievedChunk>> {
        {
            let state = self.state.read().await;
            if state.chunks.is_empty() {
                return Err(Error::EmptyIndex);
            }
            if let Some(category) = &category {
                if state.in_category(category).is_empty() {
                    return Err(Error::InvalidArgument(format!("unknown category '{category}'")));
                }
            }
        }
        let vector = self
            .embed(vec![text.clone()])
            .await?
            .pop()
            .ok_or_else(|| Error::Embedder(anyhow::anyhow!("embedder returned no vector")))?;

        let state = Arc::clone(&self.state).read_owned().await;
        if state.chunks.is_empty() {
            return Err(Error::EmptyIndex);
        }
        let mut width = k.saturating_mul(self.config.fusion.candidate_multiplier).max(k);
        if category.is_some() {
            // Filtering happens after retrieval, so scoped queries see every candidate.
            width = width.max(state.lexical.len()).max(state.semantic.len());
        }
        let fuser = self.fuser.clone();
        tokio::task::spawn_blocking(move || {
            let (lexical, semantic) = rayon::join(|| state.lexical.search(&text, width), || state.semantic.search(&vector, width));
            let (mut lexical, mut semantic) = (lexical?, semantic?);
            if let Some(category) = &category {
                let scope = state.in_category(category);
                let keep = |h: &SearchHit| scope.contains(&h.id.document_id);
                lexical.retain(keep);
                semantic.retain(keep);
            }
            let fused = fuser.fuse(&lexical, &semantic, width)?;
            let mut results: Vec<RetrievedChunk> = fused.into_iter().filter_map(|hit| state.retrieved(hit)).take(k).collect();
            for (i, r) in results.iter_mut().enumerate() {
                r.hit.rank = i + 1;
            }
            debug!(lexical = lexical.len(), semantic = semantic.len(), results = results.len(), "query");
            if results.is_empty() {
                return Err(Error::NoResults);
            }
            Ok(results)
        })
        .await
        .map_err(|e| Error::Index(e.into()))?
    }

    /// Drop every chunk of `document_id` from both indexes and the chunk store.
    /// Returns the number of chunks removed; unknown ids remove nothing.
    ///
    /// The store only changes once both indexes have dropped the chunks; on
    /// error the document stays registered and the call can be repeated.
    pub async fn remove_document(&self, document_id: &str) -> Result<usize> {
        let mut state = self.state.write().await;
        state.flush_pending();
        let Some(ids) = state.documents.get(document_id).map(|e| e.chunk_ids.clone()) else {
            return Ok(0);
        };
        state.remove_from_indexes(&ids)?;
        for id in &ids {
            state.chunks.remove(id);
        }
        state.documents.remove(document_id);
        info!(document_id, removed = ids.len(), "removed document");
        Ok(ids.len())
    }

    pub async fn stats(&self) -> EngineStats {
        let state = self.state.read().await;
        EngineStats {
            documents: state.documents.len(),
            chunks: state.chunks.len(),
            lexical_entries: state.lexical.len(),
            semantic_entries: state.semantic.len(),
            pending_removals: state.pending.len(),
            embedder_id: self.embedder.id().to_string(),
            dim: self.embedder.dim(),
        }
    }

    pub async fn document(&self, document_id: &str) -> Option<Document> {
        self.state.read().await.documents.get(document_id).map(|e| e.document.clone())
    }

    pub async fn document_ids(&self) -> Vec<DocumentId> {
        self.state.read().await.documents.keys().cloned().collect()
    }

    pub async fn chunk(&self, id: &ChunkId) -> Option<Chunk> {
        self.state.read().await.chunks.get(id).cloned()
    }

    /// Distinct `category` values of the ingested documents, sorted.
    pub async fn categories(&self) -> Vec<String> {
        let state = self.state.read().await;
        let categories: BTreeSet<&String> = state.documents.values().filter_map(|e| e.document.metadata.get(CATEGORY_KEY)).collect();
        categories.into_iter().cloned().collect()
    }
}

/// Render retrieved chunks as a numbered, source-labelled context block.
pub fn format_context(results: &[RetrievedChunk]) -> String {
    let mut out = String::new();
    for (i, r) in results.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let _ = write!(out, "[{}] {}", i + 1, r.source);
        if let Some(page) = r.chunk.page {
            let _ = write!(out, " (page {page})");
        }
        out.push('\n');
        out.push_str(r.chunk.text.trim());
    }
    out
}
