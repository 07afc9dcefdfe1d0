use recall_core::config::EmbeddingSettings;
use recall_embed::load_embedder;

fn main() -> anyhow::Result<()> {
    let embedder = load_embedder(&EmbeddingSettings::default())?;
    let texts = vec!["hello world".to_string(), "rust embeddings".to_string()];
    let embs = embedder.embed_batch(&texts)?;
    println!("B={} dim={}", embs.len(), embedder.dim());
    Ok(())
}
