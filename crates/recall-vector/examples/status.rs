use std::path::PathBuf;
use std::sync::Arc;

use recall_core::config::Config;
use recall_embed::HashEmbedder;
use recall_vector::EmbeddingIndex;

// Print record/vector counts of a persisted embedding index.
// Usage: cargo run -p recall-vector --example status -- [INDEX_DIR]
fn main() -> anyhow::Result<()> {
    let settings = Config::load()?.settings()?;
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.index_dir(std::path::Path::new(".")));
    let index = EmbeddingIndex::open(&dir, Arc::new(HashEmbedder::new(settings.embedding.dim)))?;
    println!("dir={} records={} vectors={} dim={}", dir.display(), index.len(), index.vector_count(), index.dim());
    Ok(())
}
