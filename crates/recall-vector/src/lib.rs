//! recall-vector
//!
//! Dense retrieval: an exact inner-product index over L2-normalised chunk
//! embeddings, persisted as a binary vector file plus a newline-delimited
//! JSON chunk file.

mod index;
pub mod store;

pub use index::{l2_normalize, EmbeddingIndex};
