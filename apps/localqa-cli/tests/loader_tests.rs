use std::fs;

use localqa_cli::output::{render_json, render_text};
use localqa_cli::DocumentLoader;
use localqa_core::types::DocumentFormat;
use tempfile::tempdir;

#[test]
fn lists_text_and_markdown_files_sorted() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("water")).unwrap();
    fs::write(dir.path().join("b.txt"), "bravo").unwrap();
    fs::write(dir.path().join("a.MD"), "alpha").unwrap();
    fs::write(dir.path().join("water/filters.txt"), "charcoal").unwrap();
    fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

    let loader = DocumentLoader::new(dir.path());
    let names: Vec<String> = loader
        .list_files()
        .iter()
        .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();
    assert_eq!(names, vec!["a.MD", "b.txt", "water/filters.txt"]);
}

#[test]
fn hidden_files_and_folders_are_skipped() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join(".cache")).unwrap();
    fs::write(dir.path().join(".cache/old.txt"), "stale").unwrap();
    fs::write(dir.path().join(".draft.txt"), "draft").unwrap();
    fs::write(dir.path().join("kept.txt"), "kept").unwrap();

    let files = DocumentLoader::new(dir.path()).list_files();
    assert_eq!(files, vec![dir.path().join("kept.txt")]);
}

#[test]
fn document_carries_relative_id_and_metadata() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("garden/soil")).unwrap();
    let path = dir.path().join("garden/soil/compost.txt");
    fs::write(&path, "Turn the  pile\n\n\n\nweekly.").unwrap();

    let doc = DocumentLoader::new(dir.path()).load(&path).unwrap().unwrap();
    assert_eq!(doc.id, "garden/soil/compost.txt");
    assert_eq!(doc.format, DocumentFormat::Text);
    assert_eq!(doc.metadata["filename"], "compost.txt");
    assert_eq!(doc.metadata["category"], "garden/soil");
    assert_eq!(doc.segments.len(), 1);
}

#[test]
fn top_level_files_fall_into_misc() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    fs::write(&path, "keep seeds dry").unwrap();
    let doc = DocumentLoader::new(dir.path()).load(&path).unwrap().unwrap();
    assert_eq!(doc.metadata["category"], "misc");
}

#[test]
fn form_feeds_split_pages() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("manual.txt");
    fs::write(&path, "page one\x0cpage two\x0cpage three").unwrap();
    let doc = DocumentLoader::new(dir.path()).load(&path).unwrap().unwrap();
    assert_eq!(doc.format, DocumentFormat::Pdf);
    assert_eq!(doc.segments.len(), 3);
    assert!(doc.segments[1].contains("two"));
}

#[test]
fn invalid_utf8_is_read_lossily() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("latin1.txt");
    fs::write(&path, b"caf\xe9 au lait").unwrap();
    let doc = DocumentLoader::new(dir.path()).load(&path).unwrap().unwrap();
    assert!(doc.text().contains("au lait"));
}

#[test]
fn whitespace_only_files_are_skipped() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("blank.txt"), "  \n\t\n").unwrap();
    fs::write(dir.path().join("real.txt"), "rain barrel").unwrap();
    let docs = DocumentLoader::new(dir.path()).load_all().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "real.txt");
}

#[test]
fn empty_results_render_placeholder_and_json() {
    assert!(render_text("nothing", &[]).contains("(no results)"));
    let json: serde_json::Value = serde_json::from_str(&render_json("nothing", &[]).unwrap()).unwrap();
    assert_eq!(json["query"], "nothing");
    assert!(json["results"].as_array().unwrap().is_empty());
}
