use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use recall_core::chunker::{Chunker, ChunkingConfig};
use recall_core::config::{resolve_with_base, Settings};
use recall_core::error::{Error, Result};
use recall_core::traits::Embedder;
use recall_core::types::{ChunkDraft, IngestItem, RetrievalConfig, SearchResult};
use recall_text::LexicalIndex;
use recall_vector::EmbeddingIndex;

use crate::http::{HttpRelevanceModel, HttpTextGenerator};
use crate::merger::merge;
use crate::reranker::Reranker;
use crate::rewriter::QueryRewriter;

/// Counts reported by [`HybridRetriever::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub chunks: usize,
    pub vectors: usize,
    pub lexical_documents: usize,
    pub vocabulary: usize,
    pub dim: usize,
    pub index_dir: Option<PathBuf>,
    pub rewriter: bool,
    pub reranker: bool,
}

/// Dense + lexical retrieval with optional query rewriting and reranking.
///
/// Built once and shared behind an `Arc`; every method takes `&self`.
pub struct HybridRetriever {
    chunker: Chunker,
    dense: Arc<EmbeddingIndex>,
    lexical: LexicalIndex,
    rewriter: QueryRewriter,
    reranker: Option<Reranker>,
    defaults: RetrievalConfig,
    ingest: Mutex<()>,
}

pub struct HybridRetrieverBuilder {
    embedder: Arc<dyn Embedder>,
    index_dir: Option<PathBuf>,
    chunking: ChunkingConfig,
    defaults: RetrievalConfig,
    rewriter: QueryRewriter,
    reranker: Option<Reranker>,
}

impl HybridRetrieverBuilder {
    /// Persist both indices under `dir` and load whatever is already there.
    pub fn index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }

    pub fn chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn defaults(mut self, defaults: RetrievalConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn rewriter(mut self, rewriter: QueryRewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn build(self) -> Result<HybridRetriever> {
        let chunker = Chunker::from_config(&self.chunking)?;
        let (dense, lexical) = match &self.index_dir {
            Some(dir) => (EmbeddingIndex::open(dir.clone(), self.embedder)?, LexicalIndex::open(dir.clone())?),
            None => (EmbeddingIndex::in_memory(self.embedder)?, LexicalIndex::in_memory()),
        };
        resync(&dense, &lexical)?;
        info!(
            chunks = dense.len(),
            dim = dense.dim(),
            rewriter = self.rewriter.is_enabled(),
            reranker = self.reranker.is_some(),
            "Hybrid retriever ready"
        );
        Ok(HybridRetriever {
            chunker,
            dense: Arc::new(dense),
            lexical,
            rewriter: self.rewriter,
            reranker: self.reranker,
            defaults: self.defaults,
            ingest: Mutex::new(()),
        })
    }
}

/// The lexical index is derivable from the embedding records; rebuild it when
/// the persisted copies disagree.
fn resync(dense: &EmbeddingIndex, lexical: &LexicalIndex) -> Result<()> {
    let dense_records = dense.records();
    let same = lexical.len() == dense_records.len()
        && lexical.records().iter().zip(&dense_records).all(|(l, d)| l.id == d.id);
    if !same {
        warn!(
            dense = dense_records.len(),
            lexical = lexical.len(),
            "Lexical index out of step with embedding index; rebuilding it from embedding records"
        );
        lexical.clear()?;
        lexical.add(&dense_records);
    }
    Ok(())
}

impl HybridRetriever {
    pub fn builder(embedder: Arc<dyn Embedder>) -> HybridRetrieverBuilder {
        HybridRetrieverBuilder {
            embedder,
            index_dir: None,
            chunking: ChunkingConfig::default(),
            defaults: RetrievalConfig::default(),
            rewriter: QueryRewriter::disabled(),
            reranker: None,
        }
    }

    /// Wire everything from typed settings. Relative paths resolve against `base`.
    pub fn from_settings(settings: &Settings, base: &Path) -> Result<Self> {
        settings.validate()?;
        let mut embedding = settings.embedding.clone();
        if let Some(dir) = &embedding.model_dir {
            embedding.model_dir = Some(resolve_with_base(base, dir).to_string_lossy().into_owned());
        }
        let embedder = recall_embed::load_embedder(&embedding)?;

        let mut builder = Self::builder(embedder)
            .index_dir(settings.index_dir(base))
            .chunking(settings.chunking)
            .defaults(settings.retrieval);
        if let Some(rw) = &settings.rewriter {
            let generator = HttpTextGenerator::new(rw)?;
            builder = builder.rewriter(QueryRewriter::new(Arc::new(generator), Duration::from_millis(rw.timeout_ms)));
        }
        if let Some(rr) = &settings.reranker {
            let model = HttpRelevanceModel::new(&rr.service())?;
            let mut reranker = Reranker::new(Arc::new(model))
                .with_batch_size(rr.batch_size)
                .with_timeout(Duration::from_millis(rr.timeout_ms));
            if let Some(instruction) = &rr.instruction {
                reranker = reranker.with_instruction(instruction.clone());
            }
            builder = builder.reranker(reranker);
        }
        builder.build()
    }

    pub fn defaults(&self) -> RetrievalConfig { self.defaults }

    /// Chunk, embed and index every item. Returns the number of chunks added.
    /// Ingestion is serialised so both indices assign the same ids.
    pub fn index(&self, items: &[IngestItem]) -> Result<usize> {
        let drafts: Vec<ChunkDraft> = items
            .iter()
            .flat_map(|item| self.chunker.chunk(&item.text, &item.metadata))
            .collect();
        if drafts.is_empty() {
            return Ok(0);
        }
        let _guard = self.ingest.lock();
        let records = self.dense.add(drafts)?;
        self.lexical.add(&records);
        info!(items = items.len(), chunks = records.len(), total = self.dense.len(), "Indexed");
        Ok(records.len())
    }

    pub async fn search(&self, query: &str, config: &RetrievalConfig) -> Result<Vec<SearchResult>> {
        if config.use_rerank && self.reranker.is_none() {
            return Err(Error::ModelUnavailable("reranking requested but no reranker is configured".into()));
        }
        let dense_query = if config.use_query_rewrite {
            self.rewriter.enhance(query).await
        } else {
            query.to_string()
        };

        // Query embedding is CPU-bound model inference.
        let index = Arc::clone(&self.dense);
        let dense_top_k = config.dense_top_k;
        let dense = tokio::task::spawn_blocking(move || index.search(&dense_query, dense_top_k))
            .await
            .map_err(|e| Error::ModelUnavailable(format!("dense search task failed: {e}")))??;
        let lexical = self.lexical.search(query, config.sparse_top_k);
        debug!(dense = dense.len(), lexical = lexical.len(), "Candidates retrieved");
        let mut merged = merge(dense, lexical);
        if merged.is_empty() {
            return Ok(merged);
        }

        let mut results = match (&self.reranker, config.use_rerank) {
            (Some(reranker), true) => reranker.rerank(query, merged).await?,
            _ => {
                merged.sort_by(|a, b| b.score.total_cmp(&a.score));
                merged
            }
        };
        results.truncate(config.final_top_k);
        debug!(query, results = results.len(), "Search complete");
        Ok(results)
    }

    /// `search` with the default config overridden by the given knobs.
    pub async fn query(&self, query: &str, top_k: usize, use_query_rewrite: bool, use_rerank: bool) -> Result<Vec<SearchResult>> {
        let config = self.defaults.top_k(top_k).rewrite(use_query_rewrite).rerank(use_rerank);
        self.search(query, &config).await
    }

    pub fn save(&self) -> Result<()> {
        let _guard = self.ingest.lock();
        self.dense.save()?;
        self.lexical.save()
    }

    /// Drop every chunk from both indices and remove their files.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.ingest.lock();
        self.dense.clear()?;
        self.lexical.clear()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            chunks: self.dense.len(),
            vectors: self.dense.vector_count(),
            lexical_documents: self.lexical.corpus_len(),
            vocabulary: self.lexical.vocabulary_size(),
            dim: self.dense.dim(),
            index_dir: self.dense.dir().map(Path::to_path_buf),
            rewriter: self.rewriter.is_enabled(),
            reranker: self.reranker.is_some(),
        }
    }
}
