//! Inverted-file index: vectors are partitioned around k-means centroids and a
//! query scans only the `nprobe` partitions whose centroids are closest.
//!
//! Until `train_threshold` vectors are stored the index behaves like
//! [`FlatIndex`]. It retrains whenever the collection has doubled since the
//! last training run. Training is deterministic: initial centroids are picked
//! at evenly spaced positions in chunk-id order.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use localqa_core::config::{IvfConfig, Metric};
use localqa_core::error::Result;
use localqa_core::traits::SemanticIndex;
use localqa_core::types::{ensure_k, ChunkId, SearchHit};

use crate::flat::FlatIndex;
use crate::metric::{norm, similarity};

const KMEANS_ITERATIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfParams {
    pub nlist: usize,
    pub nprobe: usize,
}

/// Pick list counts for a collection of `total` vectors: `sqrt(total)` lists
/// unless configured, never more lists than vectors.
pub fn compute_ivf_params(total: usize, config: &IvfConfig) -> IvfParams {
    let sqrt_n = (total as f64).sqrt().round() as usize;
    let mut nlist = config.nlist.unwrap_or(sqrt_n);
    nlist = nlist.min(total).max(1);
    let nprobe = config.nprobe.min(nlist).max(1);
    IvfParams { nlist, nprobe }
}

struct Partitions {
    params: IvfParams,
    centroids: Vec<Vec<f32>>,
    lists: Vec<BTreeSet<ChunkId>>,
    assignment: HashMap<ChunkId, usize>,
    trained_at: usize,
}

pub struct IvfIndex {
    store: FlatIndex,
    config: IvfConfig,
    partitions: Option<Partitions>,
}

impl IvfIndex {
    pub fn new(dim: usize, metric: Metric, config: IvfConfig) -> Self {
        Self { store: FlatIndex::new(dim, metric), config, partitions: None }
    }

    #[must_use]
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.store = self.store.with_min_score(min_score);
        self
    }

    pub fn is_trained(&self) -> bool {
        self.partitions.is_some()
    }

    /// Parameters of the current partitioning, `None` before training.
    pub fn params(&self) -> Option<IvfParams> {
        self.partitions.as_ref().map(|p| p.params)
    }

    /// Partition the stored vectors now, regardless of `train_threshold`.
    pub fn train(&mut self) {
        let total = self.store.len();
        if total == 0 {
            self.partitions = None;
            return;
        }
        let params = compute_ivf_params(total, &self.config);
        let metric = self.store.metric();
        let ids: Vec<&ChunkId> = self.store.entries.keys().collect();
        let step = total as f64 / params.nlist as f64;
        let mut centroids: Vec<Vec<f32>> = (0..params.nlist)
            .map(|i| self.store.entries[ids[(i as f64 * step) as usize]].vector.clone())
            .collect();

        let mut assignment: Vec<usize> = vec![0; total];
        for iteration in 0..KMEANS_ITERATIONS {
            let mut changed = false;
            for (slot, id) in ids.iter().enumerate() {
                let best = nearest(metric, &centroids, &self.store.entries[*id].vector);
                if best != assignment[slot] {
                    changed = true;
                    assignment[slot] = best;
                }
            }
            let dim = self.store.dim();
            let mut sums = vec![vec![0f32; dim]; params.nlist];
            let mut counts = vec![0usize; params.nlist];
            for (slot, id) in ids.iter().enumerate() {
                let list = assignment[slot];
                counts[list] += 1;
                for (s, x) in sums[list].iter_mut().zip(&self.store.entries[*id].vector) {
                    *s += x;
                }
            }
            for (list, sum) in sums.into_iter().enumerate() {
                // Empty lists keep their previous centroid.
                if counts[list] > 0 {
                    centroids[list] = sum.into_iter().map(|s| s / counts[list] as f32).collect();
                }
            }
            if iteration > 0 && !changed {
                break;
            }
        }

        let mut lists = vec![BTreeSet::new(); params.nlist];
        let mut by_id = HashMap::with_capacity(total);
        for id in ids {
            let list = nearest(metric, &centroids, &self.store.entries[id].vector);
            lists[list].insert(id.clone());
            by_id.insert(id.clone(), list);
        }
        info!(vectors = total, nlist = params.nlist, nprobe = params.nprobe, "ivf trained");
        self.partitions = Some(Partitions { params, centroids, lists, assignment: by_id, trained_at: total });
    }

    fn maybe_train(&mut self) {
        let total = self.store.len();
        let due = match &self.partitions {
            None => total >= self.config.train_threshold.max(1),
            Some(p) => total >= p.trained_at.saturating_mul(2),
        };
        if due {
            self.train();
        }
    }

    fn unassign(&mut self, ids: &[ChunkId]) {
        if let Some(p) = self.partitions.as_mut() {
            for id in ids {
                if let Some(list) = p.assignment.remove(id) {
                    p.lists[list].remove(id);
                }
            }
        }
    }
}

fn nearest(metric: Metric, centroids: &[Vec<f32>], v: &[f32]) -> usize {
    let v_norm = norm(v);
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let score = similarity(metric, v, v_norm, c, norm(c));
        if score > best_score {
            best = i;
            best_score = score;
        }
    }
    best
}

impl SemanticIndex for IvfIndex {
    fn dim(&self) -> usize {
        self.store.dim()
    }

    fn add(&mut self, id: &ChunkId, vector: Vec<f32>) -> Result<()> {
        self.store.check_vector(&vector)?;
        self.unassign(std::slice::from_ref(id));
        if let Some(p) = self.partitions.as_mut() {
            let list = nearest(self.store.metric(), &p.centroids, &vector);
            p.lists[list].insert(id.clone());
            p.assignment.insert(id.clone(), list);
        }
        self.store.insert(id, vector)?;
        self.maybe_train();
        Ok(())
    }

    fn remove(&mut self, document_id: &str) -> Result<usize> {
        let ids = self.store.ids_of(document_id);
        self.remove_chunks(&ids)
    }

    fn remove_chunks(&mut self, ids: &[ChunkId]) -> Result<usize> {
        let removed = self.store.delete(ids);
        self.unassign(&removed);
        if self.store.is_empty() {
            self.partitions = None;
        }
        Ok(removed.len())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        ensure_k(k)?;
        self.store.check_vector(query)?;
        let Some(p) = self.partitions.as_ref() else {
            return Ok(self.store.scan_all(query, k));
        };
        let metric = self.store.metric();
        let query_norm = norm(query);
        let mut ranked: Vec<(usize, f32)> = p
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, similarity(metric, query, query_norm, c, norm(c))))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let probed = &ranked[..p.params.nprobe.min(ranked.len())];
        let candidates = probed.iter().flat_map(|(list, _)| p.lists[*list].iter());
        let hits = self.store.scan(query, k, candidates);
        debug!(probed = probed.len(), hits = hits.len(), "ivf search");
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.store.len()
    }
}
