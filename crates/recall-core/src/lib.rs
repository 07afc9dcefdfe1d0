//! recall-core
//!
//! Shared data model, error taxonomy, capability traits, chunking and
//! configuration for the hybrid retrieval engine.

pub mod chunker;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use chunker::{Chunker, ChunkingConfig};
pub use error::{Error, Result};
pub use types::{
    ChunkDraft, ChunkId, ChunkRecord, IngestItem, MetaValue, Metadata, RetrievalConfig, ScoreSource, SearchResult,
};
