//! Sentence-aware chunking with whole-sentence overlap.
//!
//! Text is whitespace-normalised, split after `.`, `!` or `?` when followed by
//! whitespace, and packed greedily into chunks of at most `chunk_size`
//! characters. Each new chunk is seeded with trailing sentences of the
//! previous one until at least `chunk_overlap` characters are carried.
//! Sentences longer than `chunk_size` are cut on word boundaries with no
//! overlap between the pieces.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ChunkDraft, Metadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200 }
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        let cfg = ChunkingConfig::default();
        Self { chunk_size: cfg.chunk_size, chunk_overlap: cfg.chunk_overlap }
    }
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn from_config(cfg: &ChunkingConfig) -> Result<Self> {
        Self::new(cfg.chunk_size, cfg.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }

    pub fn chunk_overlap(&self) -> usize { self.chunk_overlap }

    /// Split `text` into drafts carrying a copy of `metadata`. Empty input
    /// yields no drafts.
    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<ChunkDraft> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        let mut out = Drafts { metadata, drafts: Vec::new() };
        let mut window: Vec<&str> = Vec::new();
        let mut window_len = 0usize;

        for sentence in split_sentences(&normalized) {
            let len = char_len(sentence);

            if len > self.chunk_size {
                out.emit(&window);
                window.clear();
                window_len = 0;
                for piece in split_words(sentence, self.chunk_size) {
                    out.push(piece);
                }
                continue;
            }

            if !window.is_empty() && window_len + 1 + len > self.chunk_size {
                out.emit(&window);
                let mut seed = self.overlap_tail(&window);
                let mut seed_len = joined_len(&seed);
                while !seed.is_empty() && seed_len + 1 + len > self.chunk_size {
                    seed.remove(0);
                    seed_len = joined_len(&seed);
                }
                window = seed;
                window_len = seed_len;
            }

            window_len = if window.is_empty() { len } else { window_len + 1 + len };
            window.push(sentence);
        }
        out.emit(&window);
        out.drafts
    }

    /// Trailing whole sentences whose combined length first reaches the
    /// overlap budget.
    fn overlap_tail<'a>(&self, window: &[&'a str]) -> Vec<&'a str> {
        if self.chunk_overlap == 0 {
            return Vec::new();
        }
        let mut carried = 0usize;
        let mut start = window.len();
        while start > 0 && carried < self.chunk_overlap {
            start -= 1;
            carried += char_len(window[start]) + usize::from(start + 1 < window.len());
        }
        window[start..].to_vec()
    }
}

struct Drafts<'m> {
    metadata: &'m Metadata,
    drafts: Vec<ChunkDraft>,
}

impl Drafts<'_> {
    fn emit(&mut self, sentences: &[&str]) {
        if !sentences.is_empty() {
            self.push(sentences.join(" "));
        }
    }

    fn push(&mut self, text: String) {
        self.drafts.push(ChunkDraft {
            chunk_index: self.drafts.len(),
            char_count: char_len(&text),
            text,
            metadata: self.metadata.clone(),
        });
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sentence boundaries on whitespace-normalised text. Terminal punctuation
/// stays with its sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(j, next)) = chars.peek() {
            if next.is_whitespace() {
                sentences.push(&text[start..i + c.len_utf8()]);
                start = j + next.len_utf8();
                chars.next();
            }
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences.retain(|s| !s.is_empty());
    sentences
}

fn split_words(sentence: &str, budget: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for word in sentence.split_whitespace() {
        let word_len = char_len(word);
        if current_len > 0 && current_len + 1 + word_len > budget {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn char_len(s: &str) -> usize { s.chars().count() }

fn joined_len(sentences: &[&str]) -> usize {
    if sentences.is_empty() {
        return 0;
    }
    sentences.iter().map(|s| char_len(s)).sum::<usize>() + sentences.len() - 1
}
