use localqa_core::config::{EmbedderConfig, EmbedderKind};
use localqa_core::error::Error;
use localqa_core::traits::Embedder;
use localqa_embed::{embedder_from_config, HashEmbedder};
use proptest::prelude::*;

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn hash_embedder_shapes_and_determinism() {
    let embedder = HashEmbedder::new(64, 256).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 64);
    assert_eq!(embedder.id(), "hash:xxh64:d64");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    assert_eq!(v1, v2);
}

#[test]
fn case_and_punctuation_do_not_matter() {
    let embedder = HashEmbedder::new(128, 256).expect("embedder");
    let a = embedder.embed("Water Filter, cleaning!").expect("embed");
    let b = embedder.embed("water filter cleaning").expect("embed");
    assert_eq!(a, b);
}

#[test]
fn shared_words_are_closer_than_unrelated_text() {
    let embedder = HashEmbedder::new(256, 256).expect("embedder");
    let q = embedder.embed("how to purify drinking water").expect("embed");
    let near = embedder.embed("purify water before drinking it").expect("embed");
    let far = embedder.embed("tractor engine oil change").expect("embed");
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[test]
fn text_without_tokens_is_zero() {
    let embedder = HashEmbedder::new(16, 256).expect("embedder");
    let v = embedder.embed("  ... !!").expect("embed");
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn tokens_past_max_len_are_ignored() {
    let embedder = HashEmbedder::new(64, 2).expect("embedder");
    let a = embedder.embed("alpha beta").expect("embed");
    let b = embedder.embed("alpha beta gamma delta").expect("embed");
    assert_eq!(a, b);
}

#[test]
fn zero_dimension_is_rejected() {
    assert!(HashEmbedder::new(0, 256).is_err());
    let config = EmbedderConfig { dim: 0, ..EmbedderConfig::default() };
    assert!(matches!(embedder_from_config(&config), Err(Error::Config(_))));
}

#[test]
fn factory_builds_hash_embedder() {
    let config = EmbedderConfig { dim: 32, ..EmbedderConfig::default() };
    let embedder = embedder_from_config(&config).expect("factory");
    assert_eq!(embedder.dim(), 32);
    assert_eq!(embedder.embed("x").expect("embed").len(), 32);
}

#[cfg(not(feature = "candle"))]
#[test]
fn candle_kind_requires_feature() {
    let config = EmbedderConfig { kind: EmbedderKind::Candle, ..EmbedderConfig::default() };
    assert!(matches!(embedder_from_config(&config), Err(Error::Config(_))));
}

#[cfg(feature = "candle")]
#[test]
fn candle_kind_requires_model_dir() {
    let config = EmbedderConfig { kind: EmbedderKind::Candle, model_dir: None, ..EmbedderConfig::default() };
    assert!(matches!(embedder_from_config(&config), Err(Error::Config(_))));
}

proptest! {
    #[test]
    fn vectors_have_configured_length(text in ".{0,200}", dim in 1usize..512) {
        let embedder = HashEmbedder::new(dim, 256).expect("embedder");
        let v = embedder.embed(&text).expect("embed");
        prop_assert_eq!(v.len(), dim);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        prop_assert!(norm == 0.0 || (norm - 1.0).abs() <= 1e-3);
    }
}
