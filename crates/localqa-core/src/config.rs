//! Configuration loader, typed engine settings, and path helpers.
//!
//! Uses Figment to merge serialized defaults + `localqa.toml` +
//! `localqa.<env>.toml` + `LOCALQA_*` env vars (`__` separates nested keys).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const CONFIG_FILE: &str = "localqa.toml";
pub const ENV_PREFIX: &str = "LOCALQA_";

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Load `localqa.toml` and the file for the current `RUST_ENV` from the
    /// working directory. Missing files are skipped.
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Self::defaults().merge(Toml::file(CONFIG_FILE));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("localqa.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("localqa.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("localqa.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Ok(Self { figment })
    }

    /// Load an explicit file on top of the defaults; env vars still win.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!("config file not found: {}", path.display())));
        }
        let figment = Self::defaults().merge(Toml::file(path)).merge(Env::prefixed(ENV_PREFIX).split("__"));
        Ok(Self { figment })
    }

    fn defaults() -> Figment {
        Figment::from(Serialized::defaults(EngineConfig::default()))
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::Config(format!("Failed to get '{key}': {e}")))
    }

    /// Extract and validate the full engine configuration.
    pub fn engine(&self) -> Result<EngineConfig> {
        let config: EngineConfig = self.figment.extract().map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chunking: ChunkingConfig,
    pub lexical: LexicalConfig,
    pub semantic: SemanticConfig,
    pub fusion: FusionConfig,
    pub query: QueryConfig,
    pub ingest: IngestConfig,
    pub embedder: EmbedderConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.lexical.validate()?;
        self.semantic.validate()?;
        self.fusion.validate()?;
        if self.embedder.dim == 0 {
            return Err(Error::Config("embedder.dim must be greater than 0".to_string()));
        }
        Ok(())
    }
}

/// Chunk window in chars and the number of chars shared by neighbours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, overlap: 200 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be greater than 0".to_string()));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LexicalBackend {
    #[default]
    Bm25,
    Tantivy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalConfig {
    pub backend: LexicalBackend,
    pub k1: f32,
    pub b: f32,
    /// On-disk location for the tantivy backend; in RAM when unset.
    pub index_dir: Option<String>,
}

pub const DEFAULT_K1: f32 = 1.5;
pub const DEFAULT_B: f32 = 0.75;

impl Default for LexicalConfig {
    fn default() -> Self {
        Self { backend: LexicalBackend::Bm25, k1: DEFAULT_K1, b: DEFAULT_B, index_dir: None }
    }
}

impl LexicalConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(Error::Config(format!("lexical.k1 must be a non-negative number, got {}", self.k1)));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(Error::Config(format!("lexical.b must be within [0, 1], got {}", self.b)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Cosine,
    InnerProduct,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStructure {
    #[default]
    Flat,
    Ivf,
}

/// Inverted-file parameters. Recall grows with `nprobe / nlist`, and so does
/// the share of vectors scanned per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IvfConfig {
    /// Number of lists; derived from the collection size when unset.
    pub nlist: Option<usize>,
    pub nprobe: usize,
    /// Vectors required before the first training run.
    pub train_threshold: usize,
}

impl Default for IvfConfig {
    fn default() -> Self {
        Self { nlist: None, nprobe: 4, train_threshold: 256 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    pub structure: IndexStructure,
    pub metric: Metric,
    pub min_score: Option<f32>,
    pub ivf: IvfConfig,
}

impl SemanticConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ivf.nprobe == 0 {
            return Err(Error::Config("semantic.ivf.nprobe must be greater than 0".to_string()));
        }
        if self.ivf.nlist == Some(0) {
            return Err(Error::Config("semantic.ivf.nlist must be greater than 0".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub lexical_weight: f32,
    pub semantic_weight: f32,
    /// Each index is asked for `candidate_multiplier * k` candidates.
    pub candidate_multiplier: usize,
    /// Rank chunks found by both indexes ahead of chunks found by one.
    pub prefer_agreement: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { lexical_weight: 0.5, semantic_weight: 0.5, candidate_multiplier: 3, prefer_agreement: true }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [("lexical_weight", self.lexical_weight), ("semantic_weight", self.semantic_weight)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::Config(format!("fusion.{name} must be a non-negative number, got {w}")));
            }
        }
        if self.lexical_weight + self.semantic_weight <= 0.0 {
            return Err(Error::Config("fusion weights must not both be zero".to_string()));
        }
        if self.candidate_multiplier == 0 {
            return Err(Error::Config("fusion.candidate_multiplier must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub timeout_ms: Option<u64>,
}

impl QueryConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub timeout_ms: Option<u64>,
}

impl IngestConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    #[default]
    Hash,
    Candle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    pub kind: EmbedderKind,
    pub dim: usize,
    pub model_dir: Option<String>,
    pub max_len: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self { kind: EmbedderKind::Hash, dim: 384, model_dir: None, max_len: 256 }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
