//! Command line arguments for the `recall` binary.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use recall_core::types::RetrievalConfig;

/// Hybrid dense + keyword retrieval over local text files.
#[derive(Parser, Debug)]
#[command(name = "recall", version, about)]
pub struct Cli {
    /// Directory holding config.toml; relative paths in the config resolve against it.
    #[arg(long, env = "RECALL_CONFIG_DIR", default_value = ".")]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Index a .txt file or every .txt file under a directory
    Ingest(IngestArgs),
    /// Search the index
    Query(QueryArgs),
    /// Show index counts
    Stats,
    /// Remove every indexed chunk
    Clear,
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    pub path: PathBuf,
    /// Category metadata for every file instead of the parent directory
    #[arg(long)]
    pub category: Option<String>,
    /// Files embedded per indexing call
    #[arg(long, default_value_t = 32)]
    pub batch: usize,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    pub text: String,
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,
    /// Expand the query with generated keywords before dense search
    #[arg(long, conflicts_with = "no_rewrite")]
    pub rewrite: bool,
    /// Skip query expansion even when config.toml enables it
    #[arg(long)]
    pub no_rewrite: bool,
    /// Re-score candidates with the relevance model
    #[arg(long, conflicts_with = "no_rerank")]
    pub rerank: bool,
    /// Skip reranking even when config.toml enables it
    #[arg(long)]
    pub no_rerank: bool,
    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryArgs {
    /// Configured defaults with the command-line overrides applied.
    pub fn retrieval_config(&self, defaults: RetrievalConfig) -> RetrievalConfig {
        defaults
            .top_k(self.top_k.unwrap_or(defaults.final_top_k))
            .rewrite(toggle(self.rewrite, self.no_rewrite, defaults.use_query_rewrite))
            .rerank(toggle(self.rerank, self.no_rerank, defaults.use_rerank))
    }
}

fn toggle(on: bool, off: bool, default: bool) -> bool {
    match (on, off) {
        (true, _) => true,
        (_, true) => false,
        _ => default,
    }
}
