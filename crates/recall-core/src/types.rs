//! Domain types shared by the chunker, both indices and the orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type ChunkId = u64;

/// A caller-defined metadata value. The engine never interprets these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self { Self::String(s.to_string()) }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self { Self::String(s) }
}

impl From<f64> for MetaValue {
    fn from(n: f64) -> Self { Self::Number(n) }
}

impl From<i64> for MetaValue {
    fn from(n: i64) -> Self { Self::Number(n as f64) }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self { Self::Bool(b) }
}

/// Key-ordered metadata map attached to every chunk.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Already-extracted text handed to the engine by an ingestion front-end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestItem {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl IngestItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), metadata: Metadata::new() }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Chunker output before the embedding index assigns a global id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDraft {
    pub chunk_index: usize,
    pub text: String,
    pub char_count: usize,
    pub metadata: Metadata,
}

/// An indexed passage.
///
/// - `id`: sequential, unique within an index, identical in both indices
/// - `chunk_index`: position within the source text it was cut from
/// - `embedding`: only populated when read back out of the embedding index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub text: String,
    pub char_count: usize,
    #[serde(default)]
    pub chunk_index: usize,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    pub fn from_draft(id: ChunkId, draft: ChunkDraft) -> Self {
        Self {
            id,
            text: draft.text,
            char_count: draft.char_count,
            chunk_index: draft.chunk_index,
            metadata: draft.metadata,
            embedding: None,
        }
    }
}

/// Indicates which stage produced a result's score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Dense,
    Lexical,
    Reranked,
}

impl ScoreSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Lexical => "lexical",
            Self::Reranked => "reranked",
        }
    }
}

/// A ranked passage. Higher `score` is always better; its scale depends on `source`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: ChunkRecord,
    pub score: f32,
    pub source: ScoreSource,
}

impl SearchResult {
    pub fn new(chunk: ChunkRecord, score: f32, source: ScoreSource) -> Self {
        Self { chunk, score, source }
    }

    pub fn text(&self) -> &str { &self.chunk.text }

    pub fn metadata(&self) -> &Metadata { &self.chunk.metadata }
}

/// Per-query retrieval knobs. The orchestrator owns a default copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub dense_top_k: usize,
    pub sparse_top_k: usize,
    pub final_top_k: usize,
    pub use_query_rewrite: bool,
    pub use_rerank: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { dense_top_k: 20, sparse_top_k: 20, final_top_k: 5, use_query_rewrite: false, use_rerank: false }
    }
}

impl RetrievalConfig {
    pub fn top_k(mut self, k: usize) -> Self { self.final_top_k = k; self }

    pub fn rewrite(mut self, on: bool) -> Self { self.use_query_rewrite = on; self }

    pub fn rerank(mut self, on: bool) -> Self { self.use_rerank = on; self }
}
