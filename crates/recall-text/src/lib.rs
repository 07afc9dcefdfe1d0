//! recall-text
//!
//! BM25 keyword index: tokenisation, term statistics, and the persisted
//! `LexicalIndex` used as the sparse half of hybrid retrieval.

pub mod bm25;
mod index;
pub mod store;
mod tokenize;

pub use bm25::{Bm25Params, Bm25Stats};
pub use index::LexicalIndex;
pub use tokenize::tokenize;
