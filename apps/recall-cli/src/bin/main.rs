use std::path::Path;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use recall_cli::args::{Cli, Command};
use recall_cli::sources;
use recall_core::config::Config;
use recall_core::types::SearchResult;
use recall_hybrid::HybridRetriever;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load_from(&cli.config_dir).context("loading configuration")?;
    let settings = config.settings()?;
    let retriever = HybridRetriever::from_settings(&settings, &cli.config_dir)?;

    match cli.command {
        Command::Ingest(args) => ingest(&retriever, &args.path, args.category.as_deref(), args.batch)?,
        Command::Query(args) => {
            let config = args.retrieval_config(retriever.defaults());
            let results = retriever.search(&args.text, &config).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&args.text, &results);
            }
        }
        Command::Stats => {
            let stats = retriever.stats();
            println!("Index: {}", stats.index_dir.as_deref().map(Path::display).map(|d| d.to_string()).unwrap_or_default());
            println!("Chunks: {} (vectors {}, lexical documents {})", stats.chunks, stats.vectors, stats.lexical_documents);
            println!("Vocabulary: {} terms", stats.vocabulary);
            println!("Embedding dimension: {}", stats.dim);
            println!("Query rewrite: {}  Rerank: {}", stats.rewriter, stats.reranker);
        }
        Command::Clear => {
            retriever.clear()?;
            println!("Index cleared");
        }
    }
    Ok(())
}

fn ingest(retriever: &HybridRetriever, path: &Path, category: Option<&str>, batch: usize) -> anyhow::Result<()> {
    let files = sources::list_txt_files(path);
    if files.is_empty() {
        warn!(path = %path.display(), "No .txt files found");
        return Ok(());
    }
    let root = if path.is_dir() { path } else { path.parent().unwrap_or(path) };

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} files {msg}")?
            .progress_chars("=> "),
    );
    let mut chunks = 0;
    for group in files.chunks(batch.max(1)) {
        let items = group
            .iter()
            .map(|f| sources::ingest_item(f, root, category))
            .collect::<anyhow::Result<Vec<_>>>()?;
        chunks += retriever.index(&items)?;
        bar.inc(group.len() as u64);
        bar.set_message(format!("{chunks} chunks"));
    }
    bar.finish();
    retriever.save()?;
    info!(files = files.len(), chunks, "Ingest complete");
    println!("Ingested {} files into {} chunks", files.len(), chunks);
    Ok(())
}

fn print_results(query: &str, results: &[SearchResult]) {
    println!("Query: {query}\n");
    if results.is_empty() {
        println!("No results.");
        return;
    }
    for (i, hit) in results.iter().enumerate() {
        let doc = hit.metadata().get("doc_id").map(ToString::to_string).unwrap_or_default();
        println!("{:>2}. [{} {:.3}] {}", i + 1, hit.source.as_str(), hit.score, doc);
        println!("    {}", hit.text());
    }
}
