//! On-disk layout of the lexical index: a bincode blob with the tokenised
//! corpus and its term statistics, and a JSON array of chunk records aligned
//! with the corpus.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use recall_core::error::{Error, Result};
use recall_core::types::ChunkRecord;

use crate::bm25::Bm25Stats;

pub const STATS_FILE: &str = "lexical.stats";
pub const CHUNKS_FILE: &str = "lexical_chunks.json";

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StatsBlob {
    version: u32,
    corpus: Vec<Vec<String>>,
    stats: Bm25Stats,
}

pub struct Stored {
    pub corpus: Vec<Vec<String>>,
    pub stats: Bm25Stats,
    pub records: Vec<ChunkRecord>,
}

pub fn stats_path(dir: &Path) -> PathBuf { dir.join(STATS_FILE) }

pub fn chunks_path(dir: &Path) -> PathBuf { dir.join(CHUNKS_FILE) }

pub fn read(dir: &Path) -> Result<Option<Stored>> {
    let stats_path = stats_path(dir);
    let chunks_path = chunks_path(dir);
    match (stats_path.exists(), chunks_path.exists()) {
        (false, false) => return Ok(None),
        (true, false) => return Err(Error::corrupt(&chunks_path, "chunk file missing next to statistics")),
        (false, true) => return Err(Error::corrupt(&stats_path, "statistics missing next to chunk file")),
        (true, true) => {}
    }

    let blob: StatsBlob = bincode::deserialize_from(BufReader::new(File::open(&stats_path)?))
        .map_err(|e| Error::corrupt(&stats_path, e))?;
    if blob.version != FORMAT_VERSION {
        return Err(Error::corrupt(&stats_path, format!("unsupported format version {}", blob.version)));
    }
    if blob.stats.doc_count != blob.corpus.len() {
        return Err(Error::corrupt(&stats_path, "statistics do not match corpus size"));
    }
    if blob.stats.doc_lens.len() != blob.stats.doc_count || blob.stats.term_freqs.len() != blob.stats.doc_count {
        return Err(Error::corrupt(&stats_path, "per-document statistics do not match document count"));
    }
    let records: Vec<ChunkRecord> = serde_json::from_reader(BufReader::new(File::open(&chunks_path)?))
        .map_err(|e| Error::corrupt(&chunks_path, e))?;
    if records.len() != blob.corpus.len() {
        return Err(Error::corrupt(
            &chunks_path,
            format!("{} chunk records but {} corpus documents", records.len(), blob.corpus.len()),
        ));
    }
    Ok(Some(Stored { corpus: blob.corpus, stats: blob.stats, records }))
}

pub fn write(dir: &Path, corpus: &[Vec<String>], stats: &Bm25Stats, records: &[ChunkRecord]) -> Result<()> {
    fs::create_dir_all(dir)?;

    let blob = StatsBlob { version: FORMAT_VERSION, corpus: corpus.to_vec(), stats: stats.clone() };
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        bincode::serialize_into(&mut w, &blob)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        w.flush()?;
    }
    tmp.persist(stats_path(dir)).map_err(|e| e.error)?;

    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        serde_json::to_writer(&mut w, records)?;
        w.flush()?;
    }
    tmp.persist(chunks_path(dir)).map_err(|e| e.error)?;
    Ok(())
}

pub fn remove(dir: &Path) -> Result<()> {
    for path in [stats_path(dir), chunks_path(dir)] {
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
