//! recall-cli
//!
//! Command-line front-end: turns plain-text files into ingest items and
//! drives the hybrid retriever.

pub mod args;
pub mod sources;
