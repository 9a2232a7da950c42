//! In-memory BM25 index with configurable saturation (`k1`) and length
//! normalization (`b`).
//!
//! Every chunk is one BM25 "document". Postings map a term to the chunks that
//! contain it with their term frequency; document frequency is the size of
//! that map.

use std::collections::{BTreeSet, HashMap, HashSet};

use tantivy::tokenizer::TextAnalyzer;
use tracing::debug;

use localqa_core::config::{LexicalConfig, DEFAULT_B, DEFAULT_K1};
use localqa_core::error::Result;
use localqa_core::traits::LexicalIndex;
use localqa_core::types::{ensure_k, rank_hits, Chunk, ChunkId, DocumentId, SearchHit, SourceKind};

use crate::tantivy_utils::{analyze, analyzer};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: DEFAULT_K1, b: DEFAULT_B }
    }
}

impl From<&LexicalConfig> for Bm25Params {
    fn from(config: &LexicalConfig) -> Self {
        Self { k1: config.k1, b: config.b }
    }
}

struct Entry {
    len: u32,
    term_freqs: HashMap<String, u32>,
}

pub struct Bm25Index {
    params: Bm25Params,
    analyzer: TextAnalyzer,
    entries: HashMap<ChunkId, Entry>,
    postings: HashMap<String, HashMap<ChunkId, u32>>,
    by_document: HashMap<DocumentId, BTreeSet<ChunkId>>,
    total_len: u64,
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new(Bm25Params::default())
    }
}

impl Bm25Index {
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            analyzer: analyzer(),
            entries: HashMap::new(),
            postings: HashMap::new(),
            by_document: HashMap::new(),
            total_len: 0,
        }
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    /// Number of distinct indexed terms.
    pub fn vocabulary_len(&self) -> usize {
        self.postings.len()
    }

    /// Number of chunks containing `term` (after analysis).
    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, HashMap::len)
    }

    fn insert(&mut self, chunk: &Chunk) {
        if self.entries.contains_key(&chunk.id) {
            self.remove_one(&chunk.id);
        }
        let terms = analyze(&mut self.analyzer, &chunk.text);
        let mut term_freqs: HashMap<String, u32> = HashMap::new();
        for term in terms {
            *term_freqs.entry(term).or_insert(0) += 1;
        }
        let len: u32 = term_freqs.values().sum();
        for (term, tf) in &term_freqs {
            self.postings.entry(term.clone()).or_default().insert(chunk.id.clone(), *tf);
        }
        self.total_len += u64::from(len);
        self.by_document.entry(chunk.document_id.clone()).or_default().insert(chunk.id.clone());
        self.entries.insert(chunk.id.clone(), Entry { len, term_freqs });
    }

    fn remove_one(&mut self, id: &ChunkId) -> bool {
        let Some(entry) = self.entries.remove(id) else { return false };
        for term in entry.term_freqs.keys() {
            if let Some(posting) = self.postings.get_mut(term) {
                posting.remove(id);
                if posting.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        self.total_len -= u64::from(entry.len);
        if let Some(ids) = self.by_document.get_mut(&id.document_id) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_document.remove(&id.document_id);
            }
        }
        true
    }

    fn idf(&self, df: usize) -> f32 {
        let n = self.entries.len() as f32;
        let df = df as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }
}

impl LexicalIndex for Bm25Index {
    fn add(&mut self, chunks: &[Chunk]) -> Result<()> {
        for chunk in chunks {
            self.insert(chunk);
        }
        debug!(added = chunks.len(), total = self.entries.len(), "bm25 add");
        Ok(())
    }

    fn remove(&mut self, document_id: &str) -> Result<usize> {
        let ids: Vec<ChunkId> = self.by_document.get(document_id).map(|s| s.iter().cloned().collect()).unwrap_or_default();
        self.remove_chunks(&ids)
    }

    fn remove_chunks(&mut self, ids: &[ChunkId]) -> Result<usize> {
        Ok(ids.iter().filter(|id| self.remove_one(id)).count())
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        ensure_k(k)?;
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let mut analyzer = self.analyzer.clone();
        let terms: HashSet<String> = analyze(&mut analyzer, query).into_iter().collect();

        let Bm25Params { k1, b } = self.params;
        let avg_len = (self.total_len as f32 / self.entries.len() as f32).max(f32::EPSILON);
        let mut scores: HashMap<&ChunkId, f32> = HashMap::new();
        for term in &terms {
            let Some(posting) = self.postings.get(term) else { continue };
            let idf = self.idf(posting.len());
            for (id, &tf) in posting {
                let len = self.entries.get(id).map_or(0, |e| e.len) as f32;
                let tf = tf as f32;
                let norm = k1 * (1.0 - b + b * len / avg_len);
                *scores.entry(id).or_insert(0.0) += idf * tf * (k1 + 1.0) / (tf + norm);
            }
        }

        let mut hits: Vec<SearchHit> = scores
            .into_iter()
            .filter(|(_, s)| *s > 0.0)
            .map(|(id, score)| SearchHit::new(id.clone(), score, SourceKind::Lexical))
            .collect();
        rank_hits(&mut hits, k);
        debug!(terms = terms.len(), hits = hits.len(), "bm25 search");
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
