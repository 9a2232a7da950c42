//! Splits document text into overlapping, gap-free passages.
//!
//! Each window is at most `chunk_size` chars. The chunker prefers to end a
//! window right after the last natural separator it contains, as long as the
//! next window still starts after the current one; otherwise it cuts hard.
//! Consecutive chunks share exactly `overlap` chars, so stripping the overlap
//! from every chunk but the first reproduces the document text.

use tracing::debug;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkId, Document};

/// Break points in priority order.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "? ", "! ", ", ", " "];

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn split(&self, document: &Document) -> Result<Vec<Chunk>> {
        let text = document.text();
        if text.is_empty() {
            return Err(Error::InvalidArgument(format!("document '{}' has no text", document.id)));
        }
        let version = document.version();
        let segment_starts = document.segment_starts();
        let paginated = document.format.is_paginated();

        // Byte offset of every char, plus the end of the text.
        let bounds: Vec<usize> = text.char_indices().map(|(b, _)| b).chain(std::iter::once(text.len())).collect();
        let n_chars = bounds.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0usize;
        loop {
            let end = self.window_end(&text, &bounds, start, n_chars);
            let page = paginated.then(|| page_of(&segment_starts, start));
            chunks.push(Chunk {
                id: ChunkId::derive(&document.id, &version, start, end),
                document_id: document.id.clone(),
                start,
                end,
                text: text[bounds[start]..bounds[end]].to_string(),
                page,
                chunk_index: chunks.len(),
                total_chunks: 0,
            });
            if end >= n_chars {
                break;
            }
            start = end - self.config.overlap;
        }

        let total_chunks = chunks.len();
        for chunk in &mut chunks {
            chunk.total_chunks = total_chunks;
        }
        debug!(document_id = %document.id, chars = n_chars, chunks = total_chunks, "split document");
        Ok(chunks)
    }

    fn window_end(&self, text: &str, bounds: &[usize], start: usize, n_chars: usize) -> usize {
        let hard_end = (start + self.config.chunk_size).min(n_chars);
        if hard_end == n_chars {
            return hard_end;
        }
        // The next window starts at `end - overlap`, which must move forward.
        let min_end = start + self.config.overlap + 1;
        let window = &text[bounds[start]..bounds[hard_end]];
        for sep in SEPARATORS {
            if let Some(pos) = window.rfind(sep) {
                let cut_byte = bounds[start] + pos + sep.len();
                // Separators are ASCII, so the cut always lands on a char boundary.
                if let Ok(cut) = bounds.binary_search(&cut_byte) {
                    if cut >= min_end {
                        return cut;
                    }
                }
            }
        }
        hard_end
    }
}

/// 1-based index of the segment containing char offset `offset`.
fn page_of(segment_starts: &[usize], offset: usize) -> u32 {
    let idx = segment_starts.partition_point(|&s| s <= offset).max(1);
    u32::try_from(idx).unwrap_or(u32::MAX)
}

/// Rebuild the chunked text by dropping each chunk's overlap with its predecessor.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;
    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.start);
        out.extend(chunk.text.chars().skip(skip));
        covered = covered.max(chunk.end);
    }
    out
}
