//! Domain types shared by the chunker, both indexes and the orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

pub type DocumentId = String;
pub type Meta = HashMap<String, String>;

/// Metadata key holding a document's folder-derived category.
pub const CATEGORY_KEY: &str = "category";

/// Separator placed between consecutive segments (pages, slides) of a document.
pub const SEGMENT_SEPARATOR: &str = "\n\n";

/// Format of the source file a document was extracted from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
    Image,
    Text,
    Other,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Self {
        let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("docx") => Self::Docx,
            Some("pptx" | "ppt") => Self::Pptx,
            Some("png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "webp") => Self::Image,
            Some("txt" | "md") => Self::Text,
            _ => Self::Other,
        }
    }

    /// Whether segments of this format correspond to pages or slides.
    pub fn is_paginated(self) -> bool {
        matches!(self, Self::Pdf | Self::Pptx | Self::Image)
    }
}

/// Extracted text of one source document plus its metadata.
///
/// Documents are immutable once extracted; re-ingesting a document means
/// building a new `Document` with the same `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub segments: Vec<String>,
    pub format: DocumentFormat,
    pub metadata: Meta,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, segments: Vec<String>, format: DocumentFormat) -> Self {
        Self { id: id.into(), segments, format, metadata: Meta::new() }
    }

    /// Single-segment plain text document.
    pub fn from_text(id: impl Into<DocumentId>, text: impl Into<String>) -> Self {
        Self::new(id, vec![text.into()], DocumentFormat::Text)
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Apply [`crate::preprocess::normalize`] to every segment. Segments are
    /// kept even when they end up empty so page numbers stay aligned.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.segments = self.segments.iter().map(|s| crate::preprocess::normalize(s)).collect();
        self
    }

    /// Full text: segments joined with [`SEGMENT_SEPARATOR`].
    pub fn text(&self) -> String {
        self.segments.join(SEGMENT_SEPARATOR)
    }

    /// Char offset at which each segment starts within [`Document::text`].
    pub fn segment_starts(&self) -> Vec<usize> {
        let sep = SEGMENT_SEPARATOR.chars().count();
        let mut starts = Vec::with_capacity(self.segments.len());
        let mut offset = 0usize;
        for segment in &self.segments {
            starts.push(offset);
            offset += segment.chars().count() + sep;
        }
        starts
    }

    /// Digest identifying this version of the document: id, format, metadata
    /// (in key order) and text all take part.
    pub fn version(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.id.as_bytes());
        hasher.update(&[0]);
        hasher.update(format!("{:?}", self.format).as_bytes());
        hasher.update(&[0]);
        let metadata: BTreeMap<&String, &String> = self.metadata.iter().collect();
        for (key, value) in metadata {
            hasher.update(key.as_bytes());
            hasher.update(&[0x1f]);
            hasher.update(value.as_bytes());
            hasher.update(&[0x1e]);
        }
        hasher.update(&[0]);
        hasher.update(self.text().as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// Human-readable label for provenance: the `filename` metadata or the id.
    pub fn source_label(&self) -> &str {
        self.metadata.get("filename").map_or(self.id.as_str(), String::as_str)
    }
}

/// Identifier of a chunk: owning document plus a digest of version and offsets.
///
/// Ordering is by document id, then digest, which gives the deterministic
/// tie-break used by every ranking in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId {
    pub document_id: DocumentId,
    pub digest: String,
}

impl ChunkId {
    pub fn new(document_id: impl Into<DocumentId>, digest: impl Into<String>) -> Self {
        Self { document_id: document_id.into(), digest: digest.into() }
    }

    /// Derive the id for the char range `[start, end)` of a document version.
    pub fn derive(document_id: &str, version: &str, start: usize, end: usize) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(document_id.as_bytes());
        hasher.update(&[0]);
        hasher.update(version.as_bytes());
        hasher.update(&(start as u64).to_le_bytes());
        hasher.update(&(end as u64).to_le_bytes());
        let hex = hasher.finalize().to_hex();
        Self::new(document_id, &hex.as_str()[..16])
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document_id, self.digest)
    }
}

/// A retrievable passage of a document.
///
/// - `start`/`end`: char offsets of the passage within `Document::text`, end exclusive
/// - `page`: 1-based page or slide number for paginated formats
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub page: Option<u32>,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// Indicates which index produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Lexical,
    Semantic,
}

/// The minimal surface returned by both indexes.
///
/// `score` is on the index's own scale (BM25 or similarity) but higher is
/// always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
}

impl SearchHit {
    pub fn new(id: ChunkId, score: f32, source: SourceKind) -> Self {
        Self { id, score, source }
    }
}

/// One entry of a fused ranking. `rank` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedHit {
    pub id: ChunkId,
    pub score: f32,
    pub rank: usize,
    pub lexical_score: Option<f32>,
    pub semantic_score: Option<f32>,
}

impl FusedHit {
    pub fn found_by_both(&self) -> bool {
        self.lexical_score.is_some() && self.semantic_score.is_some()
    }
}

/// A fused hit with its chunk payload attached, as handed to the generation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    #[serde(flatten)]
    pub hit: FusedHit,
    pub source: String,
    pub chunk: Chunk,
}

/// Reject a zero result count.
pub fn ensure_k(k: usize) -> crate::error::Result<()> {
    if k == 0 {
        return Err(crate::error::Error::InvalidArgument("k must be greater than 0".to_string()));
    }
    Ok(())
}

/// Order hits by descending score, ties by ascending chunk id, and keep the top `k`.
pub fn rank_hits(hits: &mut Vec<SearchHit>, k: usize) {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    hits.truncate(k);
}
