use std::env;
use std::path::PathBuf;

// Query a persisted lexical index and print results.
// Usage:
//   cargo run -p recall-text --example search -- "your query" [--index ./data/index] [--limit 10]

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut query = String::new();
    let mut index_dir = env::var("TEXT_INDEX_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./data/index"));
    let mut limit: usize = 10;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--index" if i + 1 < args.len() => { index_dir = PathBuf::from(&args[i + 1]); i += 2; }
            "--limit" if i + 1 < args.len() => { limit = args[i + 1].parse().unwrap_or(limit); i += 2; }
            s if s.starts_with('-') => anyhow::bail!("unknown or incomplete flag: {s}"),
            s => { if query.is_empty() { query = s.to_string(); } i += 1; }
        }
    }
    if query.is_empty() {
        anyhow::bail!("Usage: cargo run -p recall-text --example search -- <query> [--index DIR] [--limit N]");
    }

    let index = recall_text::LexicalIndex::open(&index_dir)?;
    println!("BM25 search\n===========");
    println!("Index: {} ({} chunks, {} terms)", index_dir.display(), index.len(), index.vocabulary_size());
    println!("Query: {} (limit {})\n", query, limit);

    for (i, hit) in index.search(&query, limit).iter().enumerate() {
        let doc = hit.metadata().get("doc_id").map(ToString::to_string).unwrap_or_default();
        println!("{:>2}. score={:.3} id={} doc={}\n    {}", i + 1, hit.score, hit.chunk.id, doc, hit.text());
    }
    Ok(())
}
