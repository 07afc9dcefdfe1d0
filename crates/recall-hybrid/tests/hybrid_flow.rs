use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use recall_core::config::{EmbeddingBackend, ServiceSettings, Settings};
use recall_core::traits::{Embedder, RelevanceModel, TextGenerator, TokenLogits};
use recall_core::{ChunkingConfig, Error, IngestItem, RetrievalConfig, ScoreSource, SearchResult};
use recall_embed::HashEmbedder;
use recall_hybrid::{HttpTextGenerator, HybridRetriever, QueryRewriter, Reranker};

const REFUND: &str = "Refunds require a receipt within 30 days.";
const MEALS: &str = "Employees may expense up to $50 for meals.";

fn policy_items() -> Vec<IngestItem> {
    vec![
        IngestItem::new(REFUND).with_meta("doc_id", "policy-1"),
        IngestItem::new(REFUND).with_meta("doc_id", "policy-2"),
        IngestItem::new(MEALS).with_meta("doc_id", "policy-3"),
    ]
}

fn small_chunks() -> ChunkingConfig {
    ChunkingConfig { chunk_size: 100, chunk_overlap: 0 }
}

fn retriever() -> anyhow::Result<HybridRetriever> {
    Ok(HybridRetriever::builder(Arc::new(HashEmbedder::new(1024))).chunking(small_chunks()).build()?)
}

fn texts(results: &[SearchResult]) -> Vec<&str> {
    results.iter().map(SearchResult::text).collect()
}

/// Replies with fixed keywords and remembers every prompt it saw.
struct Keywords {
    reply: &'static str,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl TextGenerator for Keywords {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self.reply.to_string())
    }
}

/// Judges documents mentioning meals as relevant.
struct MealsJudge;

#[async_trait]
impl RelevanceModel for MealsJudge {
    async fn judge(&self, inputs: &[String]) -> anyhow::Result<Vec<TokenLogits>> {
        Ok(inputs
            .iter()
            .map(|i| if i.contains("meals.") { TokenLogits { yes: 3.0, no: -1.0 } } else { TokenLogits { yes: -2.0, no: 2.0 } })
            .collect())
    }
}

/// Hash embedder that notes which thread each batch ran on.
struct ThreadNoting {
    inner: HashEmbedder,
    threads: Mutex<Vec<thread::ThreadId>>,
}

impl Embedder for ThreadNoting {
    fn dim(&self) -> usize { self.inner.dim() }

    fn max_len(&self) -> usize { self.inner.max_len() }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.threads.lock().push(thread::current().id());
        self.inner.embed_batch(texts)
    }
}

struct BrokenJudge;

#[async_trait]
impl RelevanceModel for BrokenJudge {
    async fn judge(&self, _inputs: &[String]) -> anyhow::Result<Vec<TokenLogits>> {
        anyhow::bail!("model weights not loaded")
    }
}

#[tokio::test]
async fn identical_items_stay_distinct_records() -> anyhow::Result<()> {
    let r = retriever()?;
    assert_eq!(r.index(&policy_items())?, 3);
    let stats = r.stats();
    assert_eq!(stats.chunks, 3);
    assert_eq!(stats.vectors, 3);
    assert_eq!(stats.lexical_documents, 3);
    assert_eq!(stats.dim, 1024);
    Ok(())
}

#[tokio::test]
async fn refund_query_ranks_refund_passage_first() -> anyhow::Result<()> {
    let r = retriever()?;
    r.index(&policy_items())?;
    let results = r.query("refund policy", 2, false, false).await?;

    assert_eq!(texts(&results), vec![REFUND, MEALS], "duplicate refund texts collapse under dedup");
    assert_eq!(results[0].source, ScoreSource::Dense);
    assert!(results[0].score > results[1].score);
    assert_eq!(results[0].metadata()["doc_id"].to_string(), "policy-1");
    Ok(())
}

#[tokio::test]
async fn query_embedding_runs_off_the_async_thread() -> anyhow::Result<()> {
    let embedder = Arc::new(ThreadNoting { inner: HashEmbedder::new(1024), threads: Mutex::new(Vec::new()) });
    let r = HybridRetriever::builder(embedder.clone()).chunking(small_chunks()).build()?;
    r.index(&policy_items())?;
    embedder.threads.lock().clear();

    let results = r.query("refund policy", 2, false, false).await?;
    assert_eq!(texts(&results)[0], REFUND);
    let threads = embedder.threads.lock();
    assert_eq!(threads.len(), 1);
    assert_ne!(threads[0], thread::current().id());
    Ok(())
}

#[tokio::test]
async fn unreachable_rewriter_matches_plain_search() -> anyhow::Result<()> {
    let settings = ServiceSettings {
        endpoint: "http://127.0.0.1:1/v1".into(),
        model: "keywords".into(),
        api_key_env: None,
        timeout_ms: 2_000,
    };
    let rewriter = QueryRewriter::new(Arc::new(HttpTextGenerator::new(&settings)?), Duration::from_millis(2_000));
    let r = HybridRetriever::builder(Arc::new(HashEmbedder::new(1024)))
        .chunking(small_chunks())
        .rewriter(rewriter)
        .build()?;
    r.index(&policy_items())?;

    let plain = r.query("refund policy", 5, false, false).await?;
    let rewritten = r.query("refund policy", 5, true, false).await?;
    let key = |v: &[SearchResult]| v.iter().map(|h| (h.chunk.id, h.score)).collect::<Vec<_>>();
    assert_eq!(key(&plain), key(&rewritten));
    Ok(())
}

#[tokio::test]
async fn empty_index_returns_no_results() -> anyhow::Result<()> {
    let r = retriever()?;
    assert!(r.query("anything", 5, false, false).await?.is_empty());
    assert!(r.query("anything", 5, true, false).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn rewritten_query_drives_dense_search_only() -> anyhow::Result<()> {
    let generator = Arc::new(Keywords { reply: "refunds", prompts: Mutex::new(Vec::new()) });
    let r = HybridRetriever::builder(Arc::new(HashEmbedder::new(1024)))
        .chunking(small_chunks())
        .rewriter(QueryRewriter::new(generator.clone(), Duration::from_secs(1)))
        .build()?;
    r.index(&policy_items())?;

    let plain = r.query("lunch allowance", 1, false, false).await?;
    assert_eq!(texts(&plain), vec![MEALS]);
    assert!(generator.prompts.lock().is_empty());

    let expanded = r.query("lunch allowance", 1, true, false).await?;
    assert_eq!(texts(&expanded), vec![REFUND]);
    let prompts = generator.prompts.lock();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("lunch allowance"));
    Ok(())
}

#[tokio::test]
async fn lexical_only_hits_are_scaled_into_the_merge() -> anyhow::Result<()> {
    let r = retriever()?;
    r.index(&policy_items())?;
    let config = RetrievalConfig { dense_top_k: 1, ..RetrievalConfig::default() };
    let results = r.search("receipt expense", &config).await?;

    assert_eq!(texts(&results), vec![REFUND, MEALS]);
    assert_eq!(results[0].source, ScoreSource::Dense);
    assert_eq!(results[1].source, ScoreSource::Lexical);
    assert!(results[1].score > 0.05 && results[1].score < 0.15, "bm25 / 10: {}", results[1].score);
    Ok(())
}

#[tokio::test]
async fn rerank_reorders_with_probabilities() -> anyhow::Result<()> {
    let r = HybridRetriever::builder(Arc::new(HashEmbedder::new(1024)))
        .chunking(small_chunks())
        .reranker(Reranker::new(Arc::new(MealsJudge)).with_batch_size(1))
        .build()?;
    r.index(&policy_items())?;

    let plain = r.query("refund policy", 5, false, false).await?;
    assert_eq!(texts(&plain), vec![REFUND, MEALS]);

    let reranked = r.query("refund policy", 5, false, true).await?;
    assert_eq!(texts(&reranked), vec![MEALS, REFUND]);
    assert!(reranked.iter().all(|h| h.source == ScoreSource::Reranked));
    assert!(reranked[0].score > 0.95 && reranked[1].score < 0.05);

    let again = r.query("refund policy", 5, false, true).await?;
    assert_eq!(texts(&again), texts(&reranked));
    Ok(())
}

#[tokio::test]
async fn rerank_failures_are_hard_errors() -> anyhow::Result<()> {
    let bare = retriever()?;
    bare.index(&policy_items())?;
    let err = bare.query("refund policy", 5, false, true).await.unwrap_err();
    assert!(matches!(err, Error::ModelUnavailable(_)));

    let broken = HybridRetriever::builder(Arc::new(HashEmbedder::new(1024)))
        .chunking(small_chunks())
        .reranker(Reranker::new(Arc::new(BrokenJudge)))
        .build()?;
    broken.index(&policy_items())?;
    let err = broken.query("refund policy", 5, false, true).await.unwrap_err();
    assert!(matches!(err, Error::ModelUnavailable(_)));
    Ok(())
}

#[tokio::test]
async fn saved_indices_reopen_with_same_answers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let build = || {
        HybridRetriever::builder(Arc::new(HashEmbedder::new(1024)))
            .chunking(small_chunks())
            .index_dir(dir.path())
            .build()
    };
    let first = build()?;
    first.index(&policy_items())?;
    first.save()?;
    let before = first.query("refund policy", 5, false, false).await?;

    let second = build()?;
    assert_eq!(second.stats().chunks, 3);
    let after = second.query("refund policy", 5, false, false).await?;
    let key = |v: &[SearchResult]| v.iter().map(|h| (h.chunk.id, h.score)).collect::<Vec<_>>();
    assert_eq!(key(&before), key(&after));

    assert_eq!(second.index(&[IngestItem::new("Parking is free after six.")])?, 1);
    let ids: Vec<u64> = second.query("parking", 1, false, false).await?.iter().map(|h| h.chunk.id).collect();
    assert_eq!(ids, vec![3]);
    Ok(())
}

#[tokio::test]
async fn missing_lexical_files_are_rebuilt_from_embeddings() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let first = HybridRetriever::builder(Arc::new(HashEmbedder::new(1024)))
        .chunking(small_chunks())
        .index_dir(dir.path())
        .build()?;
    first.index(&policy_items())?;
    first.save()?;
    std::fs::remove_file(recall_text::store::stats_path(dir.path()))?;
    std::fs::remove_file(recall_text::store::chunks_path(dir.path()))?;

    let reopened = HybridRetriever::builder(Arc::new(HashEmbedder::new(1024)))
        .index_dir(dir.path())
        .build()?;
    let stats = reopened.stats();
    assert_eq!((stats.chunks, stats.lexical_documents), (3, 3));
    let config = RetrievalConfig { dense_top_k: 1, ..RetrievalConfig::default() };
    let results = reopened.search("receipt expense", &config).await?;
    assert_eq!(results.last().map(|h| h.source), Some(ScoreSource::Lexical));
    Ok(())
}

#[tokio::test]
async fn clear_empties_both_indices() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let r = HybridRetriever::builder(Arc::new(HashEmbedder::new(1024))).index_dir(dir.path()).build()?;
    r.index(&policy_items())?;
    r.save()?;
    r.clear()?;
    let stats = r.stats();
    assert_eq!((stats.chunks, stats.vectors, stats.lexical_documents), (0, 0, 0));
    assert!(r.query("refund", 5, false, false).await?.is_empty());
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn concurrent_ingest_keeps_indices_aligned() -> anyhow::Result<()> {
    let r = Arc::new(retriever()?);
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let r = Arc::clone(&r);
            thread::spawn(move || -> recall_core::Result<usize> {
                let items: Vec<IngestItem> = (0..5).map(|i| IngestItem::new(format!("Worker {t} filed report {i}."))).collect();
                r.index(&items)
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().expect("thread")?, 5);
    }
    let stats = r.stats();
    assert_eq!((stats.chunks, stats.vectors, stats.lexical_documents), (20, 20, 20));
    Ok(())
}

#[test]
fn settings_wire_a_hash_backed_retriever() -> anyhow::Result<()> {
    let base = tempfile::tempdir()?;
    let mut settings = Settings::default();
    settings.embedding.backend = EmbeddingBackend::Hash;
    settings.embedding.dim = 64;
    settings.index.dir = "idx".into();
    settings.retrieval.final_top_k = 3;

    let r = HybridRetriever::from_settings(&settings, base.path())?;
    assert_eq!(r.defaults().final_top_k, 3);
    let stats = r.stats();
    assert_eq!(stats.dim, 64);
    assert_eq!(stats.index_dir, Some(base.path().join("idx")));
    assert!(!stats.rewriter && !stats.reranker);

    r.index(&policy_items())?;
    r.save()?;
    assert!(base.path().join("idx").join(recall_vector::store::VECTORS_FILE).exists());

    settings.chunking.chunk_overlap = settings.chunking.chunk_size;
    assert!(matches!(HybridRetriever::from_settings(&settings, base.path()), Err(Error::InvalidConfig(_))));
    Ok(())
}
