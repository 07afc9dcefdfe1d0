use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use recall_core::error::{Error, Result};
use recall_core::types::{ChunkRecord, ScoreSource, SearchResult};

use crate::bm25::{Bm25Params, Bm25Stats};
use crate::store;
use crate::tokenize::tokenize;

/// BM25 keyword index over chunk records.
///
/// `corpus[i]` is always the tokenised text of `records[i]`. Every `add`
/// rebuilds the term statistics from the whole corpus, so add in batches.
pub struct LexicalIndex {
    params: Bm25Params,
    dir: Option<PathBuf>,
    state: RwLock<LexicalState>,
}

#[derive(Default)]
struct LexicalState {
    corpus: Vec<Vec<String>>,
    records: Vec<ChunkRecord>,
    stats: Bm25Stats,
}

impl LexicalIndex {
    pub fn in_memory() -> Self {
        Self::with_params(Bm25Params::default())
    }

    pub fn with_params(params: Bm25Params) -> Self {
        Self { params, dir: None, state: RwLock::new(LexicalState::default()) }
    }

    /// Open the index stored in `dir`. Missing files give an empty index;
    /// unreadable files are logged and replaced by an empty index.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let mut index = Self::in_memory();
        index.dir = Some(dir.into());
        index.load()?;
        Ok(index)
    }

    pub fn load(&self) -> Result<usize> {
        let Some(dir) = self.dir.as_deref() else { return Ok(0) };
        let loaded = match store::read(dir) {
            Ok(None) => {
                info!(dir = %dir.display(), "No lexical index on disk; starting empty");
                LexicalState::default()
            }
            Ok(Some(stored)) => LexicalState { corpus: stored.corpus, records: stored.records, stats: stored.stats },
            Err(e @ Error::PersistenceCorruption { .. }) => {
                warn!(error = %e, "Lexical index unreadable; resetting to empty");
                LexicalState::default()
            }
            Err(e) => return Err(e),
        };
        let count = loaded.records.len();
        *self.state.write() = loaded;
        info!(dir = %dir.display(), count, "Lexical index loaded");
        Ok(count)
    }

    pub fn save(&self) -> Result<()> {
        let dir = self.dir.as_deref().ok_or_else(|| Error::InvalidConfig("lexical index has no storage directory".into()))?;
        self.save_to(dir)
    }

    pub fn save_to(&self, dir: &Path) -> Result<()> {
        let state = self.state.read();
        store::write(dir, &state.corpus, &state.stats, &state.records)?;
        info!(dir = %dir.display(), count = state.records.len(), "Lexical index saved");
        Ok(())
    }

    /// Append records and rebuild term statistics over the full corpus.
    pub fn add(&self, records: &[ChunkRecord]) {
        if records.is_empty() {
            return;
        }
        let tokenized: Vec<Vec<String>> = records.iter().map(|r| tokenize(&r.text)).collect();
        let mut state = self.state.write();
        state.corpus.extend(tokenized);
        state.records.extend(records.iter().map(|r| ChunkRecord { embedding: None, ..r.clone() }));
        state.stats = Bm25Stats::build(&state.corpus);
        debug!(
            added = records.len(),
            total = state.records.len(),
            vocabulary = state.stats.vocabulary_size(),
            "Lexical index rebuilt"
        );
    }

    /// Top `top_k` chunks with a positive BM25 score; ties keep corpus order.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        let tokens = tokenize(query);
        if top_k == 0 || tokens.is_empty() {
            return Vec::new();
        }
        let state = self.state.read();
        let mut scored: Vec<(usize, f32)> = state
            .stats
            .scores(&tokens, self.params)
            .into_iter()
            .enumerate()
            .filter(|(_, s)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);

        let results: Vec<SearchResult> = scored
            .into_iter()
            .map(|(pos, score)| SearchResult::new(state.records[pos].clone(), score, ScoreSource::Lexical))
            .collect();
        debug!(query, hits = results.len(), "Lexical search");
        results
    }

    pub fn clear(&self) -> Result<()> {
        *self.state.write() = LexicalState::default();
        if let Some(dir) = self.dir.as_deref() {
            store::remove(dir)?;
        }
        info!("Lexical index cleared");
        Ok(())
    }

    pub fn records(&self) -> Vec<ChunkRecord> { self.state.read().records.clone() }

    pub fn len(&self) -> usize { self.state.read().records.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Number of tokenised documents; always equal to `len()`.
    pub fn corpus_len(&self) -> usize { self.state.read().corpus.len() }

    pub fn vocabulary_size(&self) -> usize { self.state.read().stats.vocabulary_size() }

    pub fn dir(&self) -> Option<&Path> { self.dir.as_deref() }
}
