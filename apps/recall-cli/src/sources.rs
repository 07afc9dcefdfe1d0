//! Plain-text sources: `.txt` discovery and metadata for ingestion.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::warn;
use walkdir::WalkDir;

use recall_core::types::IngestItem;

/// Every `.txt` file under `root` (or `root` itself), sorted by path.
pub fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.map_err(|err| warn!(error = %err, "Skipping unreadable entry")).ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
        .collect();
    files.sort();
    files
}

/// Read a file, replacing invalid UTF-8 rather than failing.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

pub fn doc_id(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Directory of `path` relative to `root`, or "misc" for top-level files.
pub fn category(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .ok()
        .and_then(Path::parent)
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "misc".to_string())
}

/// Build the ingest item for one file. `category_override` replaces the
/// directory-derived category.
pub fn ingest_item(path: &Path, root: &Path, category_override: Option<&str>) -> Result<IngestItem> {
    let category = category_override.map_or_else(|| category(path, root), str::to_string);
    Ok(IngestItem::new(read_text(path)?)
        .with_meta("doc_id", doc_id(path))
        .with_meta("doc_path", path.to_string_lossy().into_owned())
        .with_meta("category", category))
}
