//! Rendering of query results for the terminal.

use anyhow::Result;
use serde_json::json;

use localqa_core::types::RetrievedChunk;

/// Plain-text listing, one block per hit.
pub fn render_text(query: &str, results: &[RetrievedChunk]) -> String {
    let mut out = format!("Query: {query}\n");
    if results.is_empty() {
        out.push_str("  (no results)\n");
        return out;
    }
    for r in results {
        let page = r.chunk.page.map(|p| format!(" p.{p}")).unwrap_or_default();
        let lexical = r.hit.lexical_score.map_or_else(|| "-".to_string(), |s| format!("{s:.3}"));
        let semantic = r.hit.semantic_score.map_or_else(|| "-".to_string(), |s| format!("{s:.3}"));
        out.push_str(&format!(
            "{:>3}. {:.3}  {}{}  [lex {} | sem {}]\n     {}\n",
            r.hit.rank,
            r.hit.score,
            r.source,
            page,
            lexical,
            semantic,
            preview(&r.chunk.text, 160)
        ));
    }
    out
}

/// One JSON object per query.
pub fn render_json(query: &str, results: &[RetrievedChunk]) -> Result<String> {
    Ok(serde_json::to_string(&json!({ "query": query, "results": results }))?)
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{cut}...")
}
