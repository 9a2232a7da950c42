use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use localqa_cli::output::{render_json, render_text};
use localqa_cli::DocumentLoader;
use localqa_core::config::Config;
use localqa_hybrid::{format_context, HybridEngine};

/// Ingest a folder of extracted text and answer retrieval queries against it.
#[derive(Parser, Debug)]
#[command(name = "localqa", version, about)]
struct Cli {
    /// Folder of `.txt`/`.md` files; subfolders become categories.
    data_dir: PathBuf,

    /// Query to run; repeatable. Reads one query per stdin line when omitted.
    #[arg(short, long = "query")]
    queries: Vec<String>,

    /// Only search documents in this category (subfolder of DATA_DIR).
    #[arg(long)]
    category: Option<String>,

    /// List the categories found under DATA_DIR and exit.
    #[arg(long, conflicts_with_all = ["queries", "category"])]
    list_categories: bool,

    /// Results per query.
    #[arg(short, default_value_t = 5)]
    k: usize,

    /// Config file; defaults to `localqa.toml` in the working directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit one JSON object per query.
    #[arg(long)]
    json: bool,

    /// Print the numbered context block instead of the ranked listing.
    #[arg(long, conflicts_with = "json")]
    context: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    let engine = HybridEngine::open(config.engine()?)?;

    ingest_dir(&engine, &cli.data_dir).await?;
    let stats = engine.stats().await;
    info!(documents = stats.documents, chunks = stats.chunks, embedder = %stats.embedder_id, "index ready");

    if cli.list_categories {
        for category in engine.categories().await {
            println!("{category}");
        }
        return Ok(());
    }

    if cli.queries.is_empty() {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let query = line.trim();
            if !query.is_empty() {
                run_query(&engine, &cli, query).await?;
            }
        }
    } else {
        for query in &cli.queries {
            run_query(&engine, &cli, query).await?;
        }
    }
    Ok(())
}

async fn ingest_dir(engine: &HybridEngine, data_dir: &Path) -> Result<()> {
    let loader = DocumentLoader::new(data_dir);
    let files = loader.list_files();
    info!(dir = %data_dir.display(), files = files.len(), "ingesting");

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    for path in files {
        pb.set_message(path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default());
        match loader.load(&path) {
            Ok(Some(document)) => {
                if let Err(e) = engine.ingest(document).await {
                    warn!(path = %path.display(), error = %e, "ingest failed");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "could not read file"),
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");
    Ok(())
}

async fn run_query(engine: &HybridEngine, cli: &Cli, query: &str) -> Result<()> {
    let outcome = match cli.category.as_deref() {
        Some(category) => engine.query_category(query, cli.k, category).await,
        None => engine.query(query, cli.k).await,
    };
    let results = match outcome {
        Ok(results) => results,
        Err(e) if e.is_empty_result() => Vec::new(),
        Err(e) => {
            warn!(query, error = %e, "query failed");
            return Ok(());
        }
    };
    if cli.json {
        println!("{}", render_json(query, &results)?);
    } else if cli.context {
        println!("{}\n", format_context(&results));
    } else {
        println!("{}", render_text(query, &results));
    }
    Ok(())
}
