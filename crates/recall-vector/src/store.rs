//! On-disk layout of the embedding index.
//!
//! `vectors.bin` is little-endian: magic `RVEC`, format version (u32),
//! dimension (u32), row count (u64), then `count * dim` f32 values.
//! `chunks.jsonl` holds one `ChunkRecord` per line; line `i` belongs to
//! vector row `i`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use recall_core::error::{Error, Result};
use recall_core::types::ChunkRecord;

pub const VECTORS_FILE: &str = "vectors.bin";
pub const CHUNKS_FILE: &str = "chunks.jsonl";

const MAGIC: &[u8; 4] = b"RVEC";
const FORMAT_VERSION: u32 = 1;
/// Magic, version, dimension and row count.
const HEADER_LEN: u64 = 20;

pub struct Stored {
    pub dim: usize,
    pub vectors: Vec<f32>,
    pub records: Vec<ChunkRecord>,
}

pub fn vectors_path(dir: &Path) -> PathBuf { dir.join(VECTORS_FILE) }

pub fn chunks_path(dir: &Path) -> PathBuf { dir.join(CHUNKS_FILE) }

/// Read both files. `Ok(None)` when neither exists; a lone file, a bad
/// header or misaligned contents are `PersistenceCorruption`.
pub fn read(dir: &Path) -> Result<Option<Stored>> {
    let vectors_path = vectors_path(dir);
    let chunks_path = chunks_path(dir);
    match (vectors_path.exists(), chunks_path.exists()) {
        (false, false) => return Ok(None),
        (true, false) => return Err(Error::corrupt(&chunks_path, "chunk file missing next to vector file")),
        (false, true) => return Err(Error::corrupt(&vectors_path, "vector file missing next to chunk file")),
        (true, true) => {}
    }

    let (dim, vectors) = read_vectors(&vectors_path)?;
    let records = read_chunks(&chunks_path)?;
    let rows = if dim == 0 { 0 } else { vectors.len() / dim };
    if rows != records.len() {
        return Err(Error::corrupt(
            &chunks_path,
            format!("{} chunk lines but {} vectors", records.len(), rows),
        ));
    }
    Ok(Some(Stored { dim, vectors, records }))
}

pub fn write(dir: &Path, dim: usize, vectors: &[f32], records: &[ChunkRecord]) -> Result<()> {
    fs::create_dir_all(dir)?;
    write_vectors(dir, dim, vectors)?;
    write_chunks(dir, records)
}

pub fn remove(dir: &Path) -> Result<()> {
    for path in [vectors_path(dir), chunks_path(dir)] {
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn read_vectors(path: &Path) -> Result<(usize, Vec<f32>)> {
    let corrupt = |e: std::io::Error| Error::corrupt(path, e);
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(corrupt)?;
    if &magic != MAGIC {
        return Err(Error::corrupt(path, "bad magic"));
    }
    let version = reader.read_u32::<LittleEndian>().map_err(corrupt)?;
    if version != FORMAT_VERSION {
        return Err(Error::corrupt(path, format!("unsupported format version {version}")));
    }
    let dim = reader.read_u32::<LittleEndian>().map_err(corrupt)? as usize;
    let count = reader.read_u64::<LittleEndian>().map_err(corrupt)?;
    let len = usize::try_from(count)
        .ok()
        .and_then(|c| c.checked_mul(dim))
        .ok_or_else(|| Error::corrupt(path, "vector count overflows"))?;
    let expected_len = u64::try_from(len)
        .ok()
        .and_then(|l| l.checked_mul(4))
        .and_then(|b| b.checked_add(HEADER_LEN));
    if expected_len != Some(file_len) {
        return Err(Error::corrupt(path, "vector count does not match file size"));
    }

    let mut vectors = vec![0f32; len];
    reader.read_f32_into::<LittleEndian>(&mut vectors).map_err(corrupt)?;
    let mut trailing = [0u8; 1];
    if reader.read(&mut trailing).map_err(corrupt)? != 0 {
        return Err(Error::corrupt(path, "trailing bytes after vector data"));
    }
    Ok((dim, vectors))
}

fn read_chunks(path: &Path) -> Result<Vec<ChunkRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| Error::corrupt(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ChunkRecord = serde_json::from_str(&line)
            .map_err(|e| Error::corrupt(path, format!("line {}: {e}", lineno + 1)))?;
        records.push(record);
    }
    Ok(records)
}

fn write_vectors(dir: &Path, dim: usize, vectors: &[f32]) -> Result<()> {
    let rows = if dim == 0 { 0 } else { vectors.len() / dim };
    let dim_u32 = u32::try_from(dim).map_err(|_| Error::InvalidConfig(format!("dimension {dim} too large")))?;
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(FORMAT_VERSION)?;
        w.write_u32::<LittleEndian>(dim_u32)?;
        w.write_u64::<LittleEndian>(rows as u64)?;
        for v in vectors {
            w.write_f32::<LittleEndian>(*v)?;
        }
        w.flush()?;
    }
    tmp.persist(vectors_path(dir)).map_err(|e| e.error)?;
    Ok(())
}

fn write_chunks(dir: &Path, records: &[ChunkRecord]) -> Result<()> {
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        for record in records {
            serde_json::to_writer(&mut w, record)?;
            w.write_all(b"\n")?;
        }
        w.flush()?;
    }
    tmp.persist(chunks_path(dir)).map_err(|e| e.error)?;
    Ok(())
}
