use tantivy::schema::{Schema, TextFieldIndexing, TextOptions, IndexRecordOption, STRING, STORED};
use tantivy::tokenizer::{TextAnalyzer, SimpleTokenizer, LowerCaser, RemoveLongFilter, StopWordFilter, TokenStream};
use tantivy::Index;

/// Name under which [`analyzer`] is registered on tantivy indexes.
pub const TOKENIZER_NAME: &str = "localqa_text";

const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

/// Fields: `key` (chunk id as text, for deletes), `doc_id` and `digest`
/// (stored to rebuild the chunk id), `text` (analyzed body).
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("key", STRING);
	schema_builder.add_text_field("doc_id", STRING | STORED);
	schema_builder.add_text_field("digest", STRING | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	schema_builder.add_text_field("text", text_options);
	schema_builder.build()
}

/// Lowercasing, stop-word-filtering analyzer shared by both lexical backends.
pub fn analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(40))
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
		.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(TOKENIZER_NAME, analyzer());
}

/// Run `text` through `analyzer` and collect the emitted terms in order.
pub fn analyze(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
	let mut stream = analyzer.token_stream(text);
	let mut terms = Vec::new();
	while stream.advance() {
		terms.push(stream.token().text.clone());
	}
	terms
}
