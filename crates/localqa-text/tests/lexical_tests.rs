use localqa_core::config::{LexicalBackend, LexicalConfig};
use localqa_core::error::Error;
use localqa_core::traits::LexicalIndex;
use localqa_core::types::{Chunk, ChunkId};
use localqa_text::tantivy_utils::{analyze, analyzer};
use localqa_text::{lexical_index_from_config, Bm25Index, Bm25Params, TantivyIndex};

fn chunk(doc: &str, n: usize, text: &str) -> Chunk {
    Chunk {
        id: ChunkId::new(doc, format!("{n:016x}")),
        document_id: doc.to_string(),
        start: 0,
        end: text.chars().count(),
        text: text.to_string(),
        page: None,
        chunk_index: n,
        total_chunks: 1,
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk("animals", 0, "The cat sat on the mat"),
        chunk("animals", 1, "Dogs bark loudly at night"),
        chunk("food", 0, "cat cat cat food"),
    ]
}

fn backends() -> Vec<(&'static str, Box<dyn LexicalIndex>)> {
    vec![
        ("bm25", Box::new(Bm25Index::default())),
        ("tantivy", Box::new(TantivyIndex::in_ram().expect("tantivy index"))),
    ]
}

#[test]
fn analyzer_lowercases_and_drops_stop_words() {
    let mut a = analyzer();
    assert_eq!(analyze(&mut a, "The Quick fox AND the Hound"), vec!["quick", "fox", "hound"]);
}

#[test]
fn term_frequency_wins_and_non_matching_chunks_are_absent() {
    for (name, mut index) in backends() {
        index.add(&corpus()).expect("add");
        let hits = index.search("cat", 10).expect("search");
        assert_eq!(hits.len(), 2, "{name}");
        assert_eq!(hits[0].id, ChunkId::new("food", format!("{:016x}", 0)), "{name}");
        assert!(hits[0].score >= hits[1].score, "{name}");
        assert!(hits.iter().all(|h| h.id.document_id != "animals" || h.id.digest.ends_with('0')), "{name}");
    }
}

#[test]
fn zero_k_is_rejected() {
    for (name, index) in backends() {
        let err = index.search("cat", 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{name}: {err}");
    }
}

#[test]
fn empty_index_and_stop_word_queries_return_nothing() {
    for (name, mut index) in backends() {
        assert!(index.search("cat", 5).expect("search").is_empty(), "{name}");
        index.add(&corpus()).expect("add");
        assert!(index.search("the and of", 5).expect("search").is_empty(), "{name}");
    }
}

#[test]
fn ties_are_broken_by_chunk_id() {
    for (name, mut index) in backends() {
        index.add(&[chunk("b", 0, "solar panel wiring"), chunk("a", 0, "solar panel wiring")]).expect("add");
        let hits = index.search("solar", 5).expect("search");
        let docs: Vec<&str> = hits.iter().map(|h| h.id.document_id.as_str()).collect();
        assert_eq!(docs, vec!["a", "b"], "{name}");
    }
}

#[test]
fn ties_wider_than_the_fetch_window_still_order_by_chunk_id() {
    for (name, mut index) in backends() {
        for doc in ["h", "g", "f", "e", "d", "c", "b", "a"] {
            index.add(&[chunk(doc, 0, "solar charge controller")]).expect("add");
        }
        let hits = index.search("solar", 2).expect("search");
        let docs: Vec<&str> = hits.iter().map(|h| h.id.document_id.as_str()).collect();
        assert_eq!(docs, vec!["a", "b"], "{name}");
    }
}

#[test]
fn stop_words_do_not_widen_a_query() {
    for (name, mut index) in backends() {
        index.add(&corpus()).expect("add");
        let hits = index.search("the dogs of the night", 5).expect("search");
        assert_eq!(hits.len(), 1, "{name}");
        assert_eq!(hits[0].id, ChunkId::new("animals", format!("{:016x}", 1)), "{name}");
    }
}

#[test]
fn remove_is_idempotent() {
    for (name, mut index) in backends() {
        index.add(&corpus()).expect("add");
        assert_eq!(index.remove("animals").expect("remove"), 2, "{name}");
        assert_eq!(index.remove("animals").expect("remove"), 0, "{name}");
        assert_eq!(index.remove("never-ingested").expect("remove"), 0, "{name}");
        assert_eq!(index.len(), 1, "{name}");
        assert!(index.search("dogs", 5).expect("search").is_empty(), "{name}");
    }
}

#[test]
fn remove_chunks_only_drops_named_chunks() {
    for (name, mut index) in backends() {
        index.add(&corpus()).expect("add");
        let gone = ChunkId::new("animals", format!("{:016x}", 1));
        assert_eq!(index.remove_chunks(&[gone.clone(), gone]).expect("remove"), 1, "{name}");
        assert_eq!(index.len(), 2, "{name}");
        assert!(index.search("bark", 5).expect("search").is_empty(), "{name}");
        assert_eq!(index.search("mat", 5).expect("search").len(), 1, "{name}");
    }
}

#[test]
fn adding_an_existing_id_replaces_it() {
    for (name, mut index) in backends() {
        index.add(&[chunk("d", 0, "generator maintenance")]).expect("add");
        index.add(&[chunk("d", 0, "water filtration")]).expect("add");
        assert_eq!(index.len(), 1, "{name}");
        assert!(index.search("generator", 5).expect("search").is_empty(), "{name}");
        assert_eq!(index.search("filtration", 5).expect("search").len(), 1, "{name}");
    }
}

#[test]
fn length_normalization_follows_b() {
    let chunks = [chunk("long", 0, "alpha beta gamma delta epsilon"), chunk("short", 0, "alpha")];

    let mut flat = Bm25Index::new(Bm25Params { k1: 1.5, b: 0.0 });
    flat.add(&chunks).expect("add");
    let hits = flat.search("alpha", 5).expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].score, hits[1].score);
    assert_eq!(hits[0].id.document_id, "long", "equal scores fall back to id order");

    let mut normalized = Bm25Index::new(Bm25Params { k1: 1.5, b: 0.75 });
    normalized.add(&chunks).expect("add");
    let hits = normalized.search("alpha", 5).expect("search");
    assert_eq!(hits[0].id.document_id, "short");
    assert!(hits[0].score > hits[1].score);
}

#[test]
fn rarer_terms_weigh_more() {
    let mut index = Bm25Index::default();
    index
        .add(&[
            chunk("a", 0, "battery storage battery"),
            chunk("b", 0, "battery inverter"),
            chunk("c", 0, "battery charger"),
        ])
        .expect("add");
    assert_eq!(index.document_frequency("battery"), 3);
    assert_eq!(index.document_frequency("inverter"), 1);
    let hits = index.search("battery inverter", 3).expect("search");
    assert_eq!(hits[0].id.document_id, "b");
}

#[test]
fn repeated_query_terms_count_once() {
    let mut index = Bm25Index::default();
    index.add(&corpus()).expect("add");
    let once = index.search("mat", 5).expect("search");
    let twice = index.search("mat mat", 5).expect("search");
    assert_eq!(once, twice);
}

#[test]
fn vocabulary_shrinks_on_remove() {
    let mut index = Bm25Index::default();
    index.add(&[chunk("x", 0, "unique words here")]).expect("add");
    assert_eq!(index.vocabulary_len(), 3);
    index.remove("x").expect("remove");
    assert_eq!(index.vocabulary_len(), 0);
    assert!(index.is_empty());
}

#[test]
fn malformed_query_syntax_is_tolerated() {
    let mut index = TantivyIndex::in_ram().expect("index");
    index.add(&corpus()).expect("add");
    let hits = index.search("cat AND (", 5).expect("lenient parse");
    assert!(!hits.is_empty());
}

#[test]
fn factory_builds_tantivy_in_a_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let index_dir = dir.path().join("lexical");
    let config = LexicalConfig {
        backend: LexicalBackend::Tantivy,
        index_dir: Some(index_dir.to_string_lossy().into_owned()),
        ..LexicalConfig::default()
    };
    let mut index = lexical_index_from_config(&config).expect("factory");
    index.add(&corpus()).expect("add");
    assert_eq!(index.len(), 3);
    assert!(index_dir.exists());
}

#[test]
fn directory_index_replaces_an_earlier_index() {
    let dir = tempfile::tempdir().expect("tempdir");
    let index_dir = dir.path().join("lexical");
    let mut first = TantivyIndex::create_in_dir(&index_dir).expect("create");
    first.add(&corpus()).expect("add");
    drop(first);
    let second = TantivyIndex::create_in_dir(&index_dir).expect("recreate");
    assert!(second.is_empty());
}

#[test]
fn directory_with_foreign_files_is_not_wiped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "keep me").expect("write");
    let err = TantivyIndex::create_in_dir(dir.path()).err().expect("refused");
    assert!(matches!(err, Error::Config(_)), "{err}");
    assert_eq!(std::fs::read_to_string(&notes).expect("still there"), "keep me");
}

#[test]
fn factory_rejects_invalid_parameters() {
    let config = LexicalConfig { b: 1.5, ..LexicalConfig::default() };
    assert!(matches!(lexical_index_from_config(&config), Err(Error::Config(_))));
}
