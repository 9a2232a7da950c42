//! Turns a folder of extracted text into [`Document`]s.
//!
//! Form feeds (`\x0c`, as written by `pdftotext`) mark page breaks; files that
//! contain them are treated as paginated so chunks carry page numbers.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use localqa_core::types::{Document, DocumentFormat, CATEGORY_KEY};

const PAGE_BREAK: char = '\x0c';
const EXTENSIONS: &[&str] = &["txt", "md"];

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    root: PathBuf,
}

impl DocumentLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Sorted `.txt`/`.md` files below the root. Dot-files and dot-folders are skipped.
    pub fn list_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| EXTENSIONS.iter().any(|want| ext.eq_ignore_ascii_case(want)))
            })
            .collect();
        files.sort();
        files
    }

    /// Load and normalize one file. `None` when nothing but whitespace remains.
    pub fn load(&self, file_path: &Path) -> Result<Option<Document>> {
        let content = self.read_file_content(file_path)?;
        let pages: Vec<String> = content.split(PAGE_BREAK).map(str::to_string).collect();
        let format = if pages.len() > 1 { DocumentFormat::Pdf } else { DocumentFormat::from_path(file_path) };
        let relative = file_path.strip_prefix(&self.root).unwrap_or(file_path);
        let filename = file_path.file_name().map_or_else(|| relative.to_string_lossy().to_string(), |n| n.to_string_lossy().to_string());

        let document = Document::new(self.doc_id(relative), pages, format)
            .with_meta("filename", filename)
            .with_meta(CATEGORY_KEY, self.category(relative))
            .with_meta("path", file_path.to_string_lossy())
            .normalized();
        if document.segments.iter().all(|s| s.trim().is_empty()) {
            warn!(path = %file_path.display(), "skipping file without text");
            return Ok(None);
        }
        debug!(id = %document.id, pages = document.segments.len(), "loaded document");
        Ok(Some(document))
    }

    pub fn load_all(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for path in self.list_files() {
            if let Some(doc) = self.load(&path)? {
                documents.push(doc);
            }
        }
        Ok(documents)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => {
                let bytes = fs::read(file_path).with_context(|| format!("reading {}", file_path.display()))?;
                Ok(String::from_utf8_lossy(&bytes).to_string())
            }
        }
    }

    /// Relative path with `/` separators, unique within the root.
    fn doc_id(&self, relative: &Path) -> String {
        relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
    }

    /// Parent folder relative to the root, `misc` for top-level files.
    fn category(&self, relative: &Path) -> String {
        match relative.parent().and_then(Path::to_str) {
            Some(parent) if !parent.is_empty() => parent.replace('\\', "/"),
            _ => "misc".to_string(),
        }
    }
}
