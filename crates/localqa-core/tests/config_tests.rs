use figment::Jail;
use localqa_core::config::{expand_path, resolve_with_base, Config, EngineConfig, LexicalBackend, Metric};
use localqa_core::Error;
use std::path::Path;

fn to_figment(e: Error) -> figment::Error {
    figment::Error::from(e.to_string())
}

#[test]
fn defaults_are_valid() {
    let config = EngineConfig::default();
    config.validate().expect("defaults validate");
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.overlap, 200);
    assert!((config.lexical.k1 - 1.5).abs() < f32::EPSILON);
    assert!((config.fusion.lexical_weight - config.fusion.semantic_weight).abs() < f32::EPSILON);
}

#[test]
fn file_then_env_layering() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "localqa.toml",
            r#"
            [chunking]
            chunk_size = 500
            overlap = 50

            [lexical]
            backend = "tantivy"

            [semantic]
            metric = "inner_product"
            "#,
        )?;
        jail.set_env("RUST_ENV", "test");
        jail.create_file("localqa.test.toml", "[fusion]\nsemantic_weight = 0.25\n")?;
        jail.set_env("LOCALQA_FUSION__LEXICAL_WEIGHT", "0.75");

        let config = Config::load().map_err(to_figment)?.engine().map_err(to_figment)?;
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.lexical.backend, LexicalBackend::Tantivy);
        assert_eq!(config.semantic.metric, Metric::InnerProduct);
        assert!((config.fusion.lexical_weight - 0.75).abs() < 1e-6);
        assert!((config.fusion.semantic_weight - 0.25).abs() < 1e-6);
        // untouched sections keep their defaults
        assert_eq!(config.fusion.candidate_multiplier, 3);
        Ok(())
    });
}

#[test]
fn invalid_chunking_is_rejected_at_load() {
    Jail::expect_with(|jail| {
        jail.create_file("custom.toml", "[chunking]\nchunk_size = 100\noverlap = 100\n")?;
        let config = Config::from_file(Path::new("custom.toml")).map_err(to_figment)?;
        let err = config.engine().unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");
        Ok(())
    });
}

#[test]
fn zero_fusion_weights_are_rejected() {
    let mut config = EngineConfig::default();
    config.fusion.lexical_weight = 0.0;
    config.fusion.semantic_weight = 0.0;
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn missing_explicit_file_is_config_error() {
    let err = Config::from_file(Path::new("/definitely/not/here.toml")).err().expect("missing file");
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn get_reads_nested_keys() {
    Jail::expect_with(|jail| {
        jail.create_file("localqa.toml", "[query]\ntimeout_ms = 250\n")?;
        let config = Config::load().map_err(to_figment)?;
        let timeout: Option<u64> = config.get("query.timeout_ms").map_err(to_figment)?;
        assert_eq!(timeout, Some(250));
        Ok(())
    });
}

#[test]
fn path_helpers() {
    Jail::expect_with(|jail| {
        jail.set_env("LOCALQA_TEST_DIR", "/srv/data");
        assert_eq!(expand_path("${LOCALQA_TEST_DIR}/idx"), Path::new("/srv/data/idx"));
        assert_eq!(resolve_with_base(Path::new("/base"), "rel/dir"), Path::new("/base/rel/dir"));
        assert_eq!(resolve_with_base(Path::new("/base"), "/abs"), Path::new("/abs"));
        Ok(())
    });
}
