//! Tantivy-backed lexical index.
//!
//! Scores with tantivy's own BM25 (k1 = 1.2, b = 0.75); those constants are not
//! configurable here. The index lives in RAM unless created in a directory.

use std::collections::BTreeSet;
use std::path::Path;

use tantivy::collector::{Count, TopDocs};
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;

use localqa_core::error::{Error, Result};
use localqa_core::traits::LexicalIndex;
use localqa_core::types::{ensure_k, rank_hits, Chunk, ChunkId, SearchHit, SourceKind};

use crate::tantivy_utils::{analyze, analyzer, build_schema, register_tokenizer};

const WRITER_MEMORY: usize = 50_000_000;
/// Written by tantivy at the root of every index directory.
const META_FILE: &str = "meta.json";

fn index_err<E: Into<anyhow::Error>>(e: E) -> Error {
	Error::Index(e.into())
}

pub struct TantivyIndex {
	index: Index,
	reader: IndexReader,
	key_field: Field,
	doc_id_field: Field,
	digest_field: Field,
	text_field: Field,
	analyzer: TextAnalyzer,
}

impl TantivyIndex {
	pub fn in_ram() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	/// Create a fresh index in `index_dir`, replacing an earlier tantivy index
	/// there. A non-empty directory holding anything else is left alone.
	pub fn create_in_dir(index_dir: &Path) -> Result<Self> {
		if index_dir.exists() {
			let occupied = std::fs::read_dir(index_dir).map_err(index_err)?.next().is_some();
			if occupied && !index_dir.join(META_FILE).is_file() {
				return Err(Error::Config(format!(
					"lexical.index_dir {} is not empty and holds no tantivy index",
					index_dir.display()
				)));
			}
			std::fs::remove_dir_all(index_dir).map_err(index_err)?;
		}
		std::fs::create_dir_all(index_dir).map_err(index_err)?;
		let index = Index::create_in_dir(index_dir, build_schema()).map_err(index_err)?;
		Self::from_index(index)
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let schema = index.schema();
		let key_field = schema.get_field("key").map_err(index_err)?;
		let doc_id_field = schema.get_field("doc_id").map_err(index_err)?;
		let digest_field = schema.get_field("digest").map_err(index_err)?;
		let text_field = schema.get_field("text").map_err(index_err)?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(index_err)?;
		Ok(Self { index, reader, key_field, doc_id_field, digest_field, text_field, analyzer: analyzer() })
	}

	fn writer(&self) -> Result<IndexWriter> {
		self.index.writer(WRITER_MEMORY).map_err(index_err)
	}

	fn commit(&self, mut writer: IndexWriter) -> Result<()> {
		writer.commit().map_err(index_err)?;
		self.reader.reload().map_err(index_err)
	}

	fn count(&self, field: Field, value: &str) -> Result<usize> {
		let query = TermQuery::new(Term::from_field_text(field, value), IndexRecordOption::Basic);
		self.reader.searcher().search(&query, &Count).map_err(index_err)
	}

	/// OR of the analyzed query terms; `None` when only stop words remain.
	fn terms_query(&self, query: &str) -> Option<BooleanQuery> {
		let mut analyzer = self.analyzer.clone();
		let terms: BTreeSet<String> = analyze(&mut analyzer, query).into_iter().collect();
		if terms.is_empty() { return None; }
		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.iter()
			.map(|t| {
				let q = TermQuery::new(Term::from_field_text(self.text_field, t), IndexRecordOption::WithFreqs);
				(Occur::Should, Box::new(q) as Box<dyn Query>)
			})
			.collect();
		Some(BooleanQuery::new(clauses))
	}

	fn chunk_id(&self, doc: &TantivyDocument) -> ChunkId {
		let get = |field| doc.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string();
		ChunkId::new(get(self.doc_id_field), get(self.digest_field))
	}
}

impl LexicalIndex for TantivyIndex {
	fn add(&mut self, chunks: &[Chunk]) -> Result<()> {
		if chunks.is_empty() { return Ok(()); }
		let writer = self.writer()?;
		for c in chunks {
			let key = c.id.to_string();
			writer.delete_term(Term::from_field_text(self.key_field, &key));
			writer.add_document(doc!(
				self.key_field => key,
				self.doc_id_field => c.id.document_id.clone(),
				self.digest_field => c.id.digest.clone(),
				self.text_field => c.text.clone(),
			)).map_err(index_err)?;
		}
		self.commit(writer)?;
		debug!(added = chunks.len(), "tantivy add");
		Ok(())
	}

	fn remove(&mut self, document_id: &str) -> Result<usize> {
		let removed = self.count(self.doc_id_field, document_id)?;
		if removed == 0 { return Ok(0); }
		let writer = self.writer()?;
		writer.delete_term(Term::from_field_text(self.doc_id_field, document_id));
		self.commit(writer)?;
		Ok(removed)
	}

	fn remove_chunks(&mut self, ids: &[ChunkId]) -> Result<usize> {
		let unique: BTreeSet<String> = ids.iter().map(ToString::to_string).collect();
		let mut keys = Vec::new();
		let mut removed = 0;
		for key in unique {
			let n = self.count(self.key_field, &key)?;
			if n > 0 { removed += n; keys.push(key); }
		}
		if keys.is_empty() { return Ok(0); }
		let writer = self.writer()?;
		for key in keys { writer.delete_term(Term::from_field_text(self.key_field, &key)); }
		self.commit(writer)?;
		Ok(removed)
	}

	fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		ensure_k(k)?;
		let searcher = self.reader.searcher();
		if searcher.num_docs() == 0 { return Ok(Vec::new()); }
		let Some(q) = self.terms_query(query) else { return Ok(Vec::new()) };
		// Tantivy breaks score ties by doc address; widen the fetch until the
		// whole tie group at position k is in hand, then re-order by chunk id.
		let mut limit = k.saturating_mul(2);
		let top_docs = loop {
			let top = searcher.search(&q, &TopDocs::with_limit(limit)).map_err(index_err)?;
			if top.len() < limit || top[limit - 1].0 < top[k - 1].0 { break top; }
			limit = limit.saturating_mul(2);
		};
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(index_err)?;
			hits.push(SearchHit::new(self.chunk_id(&doc), score, SourceKind::Lexical));
		}
		rank_hits(&mut hits, k);
		Ok(hits)
	}

	fn len(&self) -> usize {
		usize::try_from(self.reader.searcher().num_docs()).unwrap_or(usize::MAX)
	}
}
