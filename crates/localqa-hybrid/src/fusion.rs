//! Merges lexical and semantic candidate lists into one ranking.
//!
//! Each source is min-max normalized to `[0, 1]` on its own candidates (a
//! single candidate, or all-equal scores, normalize to 1.0), then combined by
//! weighted sum. A chunk missing from one source contributes 0 for it.
//! Ordering: found-by-both first when `prefer_agreement` is set, then fused
//! score, then raw semantic score, then chunk id.

use std::cmp::Ordering;
use std::collections::HashMap;

use localqa_core::config::FusionConfig;
use localqa_core::error::Result;
use localqa_core::types::{ensure_k, ChunkId, FusedHit, SearchHit};

#[derive(Debug, Clone, Default)]
pub struct FusionRanker {
    config: FusionConfig,
}

/// Highest raw score per chunk id.
fn dedup(hits: &[SearchHit]) -> HashMap<&ChunkId, f32> {
    let mut best: HashMap<&ChunkId, f32> = HashMap::with_capacity(hits.len());
    for h in hits {
        best.entry(&h.id).and_modify(|s| *s = s.max(h.score)).or_insert(h.score);
    }
    best
}

fn min_max(scores: &HashMap<&ChunkId, f32>) -> impl Fn(f32) -> f32 {
    let (lo, hi) = scores
        .values()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| (lo.min(*s), hi.max(*s)));
    let span = hi - lo;
    move |s| if span > 0.0 && span.is_finite() { (s - lo) / span } else { 1.0 }
}

impl FusionRanker {
    pub fn new(config: FusionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Fuse both candidate lists and return at most `k` hits ranked from 1.
    pub fn fuse(&self, lexical: &[SearchHit], semantic: &[SearchHit], k: usize) -> Result<Vec<FusedHit>> {
        ensure_k(k)?;
        let lexical = dedup(lexical);
        let semantic = dedup(semantic);
        let norm_lexical = min_max(&lexical);
        let norm_semantic = min_max(&semantic);

        let mut merged: HashMap<&ChunkId, FusedHit> = HashMap::with_capacity(lexical.len() + semantic.len());
        for (id, raw) in &lexical {
            merged.entry(*id).or_insert_with(|| blank((*id).clone())).lexical_score = Some(*raw);
        }
        for (id, raw) in &semantic {
            merged.entry(*id).or_insert_with(|| blank((*id).clone())).semantic_score = Some(*raw);
        }

        let FusionConfig { lexical_weight, semantic_weight, .. } = self.config;
        let mut fused: Vec<FusedHit> = merged
            .into_values()
            .map(|mut hit| {
                let l = hit.lexical_score.map_or(0.0, &norm_lexical);
                let s = hit.semantic_score.map_or(0.0, &norm_semantic);
                hit.score = lexical_weight * l + semantic_weight * s;
                hit
            })
            .collect();

        let prefer_agreement = self.config.prefer_agreement;
        fused.sort_by(|a, b| {
            let tier = if prefer_agreement { b.found_by_both().cmp(&a.found_by_both()) } else { Ordering::Equal };
            tier.then_with(|| b.score.total_cmp(&a.score))
                .then_with(|| cmp_semantic(b.semantic_score, a.semantic_score))
                .then_with(|| a.id.cmp(&b.id))
        });
        fused.truncate(k);
        for (i, hit) in fused.iter_mut().enumerate() {
            hit.rank = i + 1;
        }
        Ok(fused)
    }
}

fn blank(id: ChunkId) -> FusedHit {
    FusedHit { id, score: 0.0, rank: 0, lexical_score: None, semantic_score: None }
}

/// Missing semantic scores order below any present score.
fn cmp_semantic(a: Option<f32>, b: Option<f32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}
