use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use recall_core::error::{Error, Result};
use recall_core::traits::Embedder;
use recall_core::types::{ChunkDraft, ChunkId, ChunkRecord, ScoreSource, SearchResult};

use crate::store;

/// Exact inner-product index over L2-normalised chunk embeddings.
///
/// Row `i` of the vector matrix always belongs to `records[i]`; both are
/// only mutated together under the write lock.
pub struct EmbeddingIndex {
    embedder: Arc<dyn Embedder>,
    dim: usize,
    dir: Option<PathBuf>,
    state: RwLock<DenseState>,
}

#[derive(Default)]
struct DenseState {
    vectors: Vec<f32>,
    records: Vec<ChunkRecord>,
    next_id: ChunkId,
}

impl DenseState {
    fn from_records(vectors: Vec<f32>, records: Vec<ChunkRecord>) -> Self {
        let next_id = records.iter().map(|r| r.id + 1).max().unwrap_or(0);
        Self { vectors, records, next_id }
    }
}

impl EmbeddingIndex {
    /// An index with no backing directory.
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Result<Self> {
        let dim = embedder.dim();
        if dim == 0 {
            return Err(Error::ModelUnavailable("embedder reports dimension 0".into()));
        }
        Ok(Self { embedder, dim, dir: None, state: RwLock::new(DenseState::default()) })
    }

    /// Open the index stored in `dir`. Missing files give an empty index;
    /// unreadable files are logged and replaced by an empty index.
    pub fn open(dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let mut index = Self::in_memory(embedder)?;
        index.dir = Some(dir.into());
        index.load()?;
        Ok(index)
    }

    /// Replace in-memory state with the persisted copy. Returns the number
    /// of records loaded.
    pub fn load(&self) -> Result<usize> {
        let Some(dir) = self.dir.as_deref() else { return Ok(0) };
        let loaded = match store::read(dir) {
            Ok(None) => {
                info!(dir = %dir.display(), "No embedding index on disk; starting empty");
                DenseState::default()
            }
            Ok(Some(stored)) if stored.dim != self.dim && !stored.records.is_empty() => {
                warn!(
                    dir = %dir.display(),
                    stored = stored.dim,
                    expected = self.dim,
                    "Embedding index dimension does not match the embedder; resetting to empty"
                );
                DenseState::default()
            }
            Ok(Some(stored)) => DenseState::from_records(stored.vectors, stored.records),
            Err(e @ Error::PersistenceCorruption { .. }) => {
                warn!(error = %e, "Embedding index unreadable; resetting to empty");
                DenseState::default()
            }
            Err(e) => return Err(e),
        };
        let count = loaded.records.len();
        *self.state.write() = loaded;
        info!(dir = %dir.display(), count, "Embedding index loaded");
        Ok(count)
    }

    pub fn save(&self) -> Result<()> {
        let dir = self.dir.as_deref().ok_or_else(|| Error::InvalidConfig("embedding index has no storage directory".into()))?;
        self.save_to(dir)
    }

    pub fn save_to(&self, dir: &Path) -> Result<()> {
        let state = self.state.read();
        store::write(dir, self.dim, &state.vectors, &state.records)?;
        info!(dir = %dir.display(), count = state.records.len(), "Embedding index saved");
        Ok(())
    }

    /// Embed and append drafts, assigning the next sequential ids. Nothing is
    /// appended if any embedding fails or has the wrong dimension.
    pub fn add(&self, drafts: Vec<ChunkDraft>) -> Result<Vec<ChunkRecord>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = drafts.iter().map(|d| d.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .map_err(|e| Error::ModelUnavailable(format!("embedding failed: {e}")))?;
        if embeddings.len() != drafts.len() {
            return Err(Error::ModelUnavailable(format!(
                "embedder returned {} vectors for {} texts",
                embeddings.len(),
                drafts.len()
            )));
        }
        let mut flat = Vec::with_capacity(drafts.len() * self.dim);
        for mut v in embeddings {
            if v.len() != self.dim {
                return Err(Error::DimensionMismatch { expected: self.dim, actual: v.len() });
            }
            l2_normalize(&mut v);
            flat.extend(v);
        }

        let mut state = self.state.write();
        let first_id = state.next_id;
        let records: Vec<ChunkRecord> = drafts
            .into_iter()
            .enumerate()
            .map(|(i, d)| ChunkRecord::from_draft(first_id + i as ChunkId, d))
            .collect();
        state.vectors.extend(flat);
        state.records.extend(records.iter().cloned());
        state.next_id = first_id + records.len() as ChunkId;
        debug!(added = records.len(), total = state.records.len(), "Embedding index append");
        Ok(records)
    }

    /// Top `top_k` chunks by cosine similarity with the query.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let mut q = self
            .embedder
            .embed_batch(&[query.to_string()])
            .map_err(|e| Error::ModelUnavailable(format!("query embedding failed: {e}")))?
            .pop()
            .ok_or_else(|| Error::ModelUnavailable("embedder returned no query vector".into()))?;
        if q.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: q.len() });
        }
        l2_normalize(&mut q);

        let state = self.state.read();
        let mut scored: Vec<(usize, f32)> = state
            .vectors
            .chunks_exact(self.dim)
            .map(|row| dot(row, &q))
            .enumerate()
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);

        let results = scored
            .into_iter()
            .map(|(pos, score)| SearchResult::new(state.records[pos].clone(), score.clamp(-1.0, 1.0), ScoreSource::Dense))
            .collect::<Vec<_>>();
        debug!(query, hits = results.len(), "Dense search");
        Ok(results)
    }

    /// Drop every record and vector, including the persisted files.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.write();
        *state = DenseState::default();
        if let Some(dir) = self.dir.as_deref() {
            store::remove(dir)?;
        }
        info!("Embedding index cleared");
        Ok(())
    }

    /// The record with `id`, with its stored embedding attached.
    pub fn get(&self, id: ChunkId) -> Option<ChunkRecord> {
        let state = self.state.read();
        let pos = state.records.iter().position(|r| r.id == id)?;
        let mut record = state.records[pos].clone();
        record.embedding = Some(state.vectors[pos * self.dim..(pos + 1) * self.dim].to_vec());
        Some(record)
    }

    pub fn records(&self) -> Vec<ChunkRecord> { self.state.read().records.clone() }

    pub fn len(&self) -> usize { self.state.read().records.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn vector_count(&self) -> usize { self.state.read().vectors.len() / self.dim }

    pub fn dim(&self) -> usize { self.dim }

    pub fn dir(&self) -> Option<&Path> { self.dir.as_deref() }
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for x in v.iter_mut() { *x /= norm; }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
