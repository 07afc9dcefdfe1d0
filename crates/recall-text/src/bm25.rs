//! Okapi BM25 term statistics, rebuilt from the full corpus on every change.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Length normalisation strength.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bm25Stats {
    pub doc_count: usize,
    pub avg_doc_len: f32,
    pub doc_lens: Vec<u32>,
    pub doc_freqs: HashMap<String, u32>,
    pub term_freqs: Vec<HashMap<String, u32>>,
    pub idf: HashMap<String, f32>,
}

impl Bm25Stats {
    pub fn build(corpus: &[Vec<String>]) -> Self {
        let doc_count = corpus.len();
        let mut doc_lens = Vec::with_capacity(doc_count);
        let mut doc_freqs: HashMap<String, u32> = HashMap::new();
        let mut term_freqs = Vec::with_capacity(doc_count);
        let mut total_len = 0usize;

        for doc in corpus {
            total_len += doc.len();
            doc_lens.push(u32::try_from(doc.len()).unwrap_or(u32::MAX));
            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in doc {
                *tf.entry(token.clone()).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(tf);
        }

        let n = doc_count as f32;
        let idf = doc_freqs
            .iter()
            .map(|(term, &df)| {
                let df = df as f32;
                (term.clone(), (1.0 + (n - df + 0.5) / (df + 0.5)).ln())
            })
            .collect();
        let avg_doc_len = if doc_count == 0 { 0.0 } else { total_len as f32 / n };

        Self { doc_count, avg_doc_len, doc_lens, doc_freqs, term_freqs, idf }
    }

    /// BM25 score of every document for the tokenised query, in corpus order.
    pub fn scores(&self, query: &[String], params: Bm25Params) -> Vec<f32> {
        let mut scores = vec![0f32; self.doc_count];
        for term in query {
            let Some(&idf) = self.idf.get(term) else { continue };
            for (doc, tf) in self.term_freqs.iter().enumerate() {
                let Some(&f) = tf.get(term) else { continue };
                let f = f as f32;
                let len_ratio = if self.avg_doc_len > 0.0 { self.doc_lens[doc] as f32 / self.avg_doc_len } else { 0.0 };
                let norm = params.k1 * (1.0 - params.b + params.b * len_ratio);
                scores[doc] += idf * f * (params.k1 + 1.0) / (f + norm);
            }
        }
        scores
    }

    pub fn vocabulary_size(&self) -> usize { self.doc_freqs.len() }
}
