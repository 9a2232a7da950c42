use localqa_core::preprocess;
use localqa_core::types::{rank_hits, ChunkId, Document, DocumentFormat, SearchHit, SourceKind};
use std::path::Path;

#[test]
fn normalize_strips_noise() {
    let raw = "<p>Visit https://example.com now</p>\n\n\n\ninfor-\nmation • item   one — done ";
    let clean = preprocess::normalize(raw);
    assert_eq!(clean, "Visit now\n\ninformation - item one - done");
}

#[test]
fn normalized_document_keeps_page_alignment() {
    let doc = Document::new("d", vec!["<b></b>".into(), "second".into()], DocumentFormat::Pdf).normalized();
    assert_eq!(doc.segments, vec![String::new(), "second".to_string()]);
}

#[test]
fn format_from_extension() {
    assert_eq!(DocumentFormat::from_path(Path::new("a/b/report.PDF")), DocumentFormat::Pdf);
    assert_eq!(DocumentFormat::from_path(Path::new("slides.pptx")), DocumentFormat::Pptx);
    assert_eq!(DocumentFormat::from_path(Path::new("scan.jpeg")), DocumentFormat::Image);
    assert_eq!(DocumentFormat::from_path(Path::new("notes.md")), DocumentFormat::Text);
    assert_eq!(DocumentFormat::from_path(Path::new("archive.zip")), DocumentFormat::Other);
}

#[test]
fn segment_starts_account_for_separator() {
    let doc = Document::new("d", vec!["abc".into(), "de".into(), "f".into()], DocumentFormat::Pptx);
    assert_eq!(doc.text(), "abc\n\nde\n\nf");
    assert_eq!(doc.segment_starts(), vec![0, 5, 9]);
}

#[test]
fn version_tracks_content_format_and_metadata() {
    let a = Document::from_text("d", "same");
    let b = Document::from_text("d", "same").with_meta("filename", "d.txt");
    let c = Document::from_text("d", "changed");
    let pdf = Document::new("d", vec!["same".to_string()], DocumentFormat::Pdf);
    assert_eq!(a.version(), Document::from_text("d", "same").version());
    assert_ne!(a.version(), b.version());
    assert_ne!(a.version(), c.version());
    assert_ne!(a.version(), pdf.version());

    let ab = Document::from_text("d", "same").with_meta("a", "1").with_meta("b", "2");
    let ba = Document::from_text("d", "same").with_meta("b", "2").with_meta("a", "1");
    assert_eq!(ab.version(), ba.version(), "metadata order does not matter");
    assert_eq!(b.source_label(), "d.txt");
    assert_eq!(a.source_label(), "d");
}

#[test]
fn rank_hits_breaks_ties_by_id() {
    let hit = |doc: &str, score: f32| SearchHit::new(ChunkId::new(doc, "0"), score, SourceKind::Lexical);
    let mut hits = vec![hit("b", 1.0), hit("a", 1.0), hit("c", 2.0)];
    rank_hits(&mut hits, 2);
    let order: Vec<&str> = hits.iter().map(|h| h.id.document_id.as_str()).collect();
    assert_eq!(order, vec!["c", "a"]);
}
