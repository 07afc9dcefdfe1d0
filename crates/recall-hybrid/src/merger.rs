use std::collections::HashSet;

use recall_core::types::SearchResult;

/// Lexical-only scores are divided by this before they compete with cosine
/// similarities. Heuristic scale matching, not a calibration.
pub const LEXICAL_SCALE: f32 = 10.0;

/// Dense results first, then lexical; duplicates by exact text keep the first
/// occurrence. Lexical-only results get `min(bm25 / LEXICAL_SCALE, 1.0)`.
pub fn merge(dense: Vec<SearchResult>, lexical: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen: HashSet<String> = HashSet::with_capacity(dense.len() + lexical.len());
    let mut merged = Vec::with_capacity(dense.len() + lexical.len());
    for hit in dense {
        if seen.insert(hit.chunk.text.clone()) {
            merged.push(hit);
        }
    }
    for mut hit in lexical {
        if seen.insert(hit.chunk.text.clone()) {
            hit.score = (hit.score / LEXICAL_SCALE).min(1.0);
            merged.push(hit);
        }
    }
    merged
}
