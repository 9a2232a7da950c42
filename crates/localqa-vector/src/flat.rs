//! Exact nearest-neighbour search by exhaustive scan.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use localqa_core::config::Metric;
use localqa_core::error::{Error, Result};
use localqa_core::traits::SemanticIndex;
use localqa_core::types::{ensure_k, rank_hits, ChunkId, SearchHit, SourceKind};

use crate::metric::{norm, similarity};

/// Scans below this many vectors stay on the calling thread.
const PARALLEL_SCAN_MIN: usize = 4096;

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) vector: Vec<f32>,
    pub(crate) norm: f32,
}

#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    metric: Metric,
    min_score: Option<f32>,
    pub(crate) entries: BTreeMap<ChunkId, Entry>,
}

impl FlatIndex {
    pub fn new(dim: usize, metric: Metric) -> Self {
        Self { dim, metric, min_score: None, entries: BTreeMap::new() }
    }

    /// Drop hits scoring below `min_score`.
    #[must_use]
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn min_score(&self) -> Option<f32> {
        self.min_score
    }

    pub fn get(&self, id: &ChunkId) -> Option<&[f32]> {
        self.entries.get(id).map(|e| e.vector.as_slice())
    }

    pub(crate) fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidArgument("vector contains non-finite values".to_string()));
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, id: &ChunkId, vector: Vec<f32>) -> Result<()> {
        self.check_vector(&vector)?;
        let norm = norm(&vector);
        self.entries.insert(id.clone(), Entry { vector, norm });
        Ok(())
    }

    pub(crate) fn ids_of(&self, document_id: &str) -> Vec<ChunkId> {
        self.entries.keys().filter(|id| id.document_id == document_id).cloned().collect()
    }

    pub(crate) fn delete(&mut self, ids: &[ChunkId]) -> Vec<ChunkId> {
        ids.iter().filter(|id| self.entries.remove(id).is_some()).cloned().collect()
    }

    fn score(&self, query: &[f32], query_norm: f32, id: &ChunkId, entry: &Entry) -> Option<SearchHit> {
        let score = similarity(self.metric, query, query_norm, &entry.vector, entry.norm);
        match self.min_score {
            Some(min) if score < min => None,
            _ => Some(SearchHit::new(id.clone(), score, SourceKind::Semantic)),
        }
    }

    /// Score the given candidates exactly and keep the best `k`.
    pub(crate) fn scan<'a>(&self, query: &[f32], k: usize, candidates: impl Iterator<Item = &'a ChunkId>) -> Vec<SearchHit> {
        let query_norm = norm(query);
        let mut hits: Vec<SearchHit> = candidates
            .filter_map(|id| self.entries.get(id).and_then(|e| self.score(query, query_norm, id, e)))
            .collect();
        rank_hits(&mut hits, k);
        hits
    }

    pub(crate) fn scan_all(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let query_norm = norm(query);
        let mut hits: Vec<SearchHit> = if self.entries.len() >= PARALLEL_SCAN_MIN {
            self.entries.par_iter().filter_map(|(id, e)| self.score(query, query_norm, id, e)).collect()
        } else {
            self.entries.iter().filter_map(|(id, e)| self.score(query, query_norm, id, e)).collect()
        };
        rank_hits(&mut hits, k);
        hits
    }
}

impl SemanticIndex for FlatIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    fn add(&mut self, id: &ChunkId, vector: Vec<f32>) -> Result<()> {
        self.insert(id, vector)
    }

    fn remove(&mut self, document_id: &str) -> Result<usize> {
        let ids = self.ids_of(document_id);
        Ok(self.delete(&ids).len())
    }

    fn remove_chunks(&mut self, ids: &[ChunkId]) -> Result<usize> {
        Ok(self.delete(ids).len())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        ensure_k(k)?;
        self.check_vector(query)?;
        let hits = self.scan_all(query, k);
        debug!(scanned = self.entries.len(), hits = hits.len(), "flat search");
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
