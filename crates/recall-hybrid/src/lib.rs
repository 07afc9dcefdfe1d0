//! recall-hybrid
//!
//! Hybrid orchestration: dense and lexical candidates merged by text, with
//! optional LLM query expansion and relevance reranking.

pub mod http;
pub mod merger;
pub mod reranker;
mod retriever;
pub mod rewriter;

pub use http::{HttpRelevanceModel, HttpTextGenerator};
pub use merger::merge;
pub use reranker::Reranker;
pub use retriever::{HybridRetriever, HybridRetrieverBuilder, IndexStats};
pub use rewriter::QueryRewriter;
