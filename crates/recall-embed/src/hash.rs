use anyhow::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use recall_core::traits::Embedder;

/// Deterministic feature-hashing embedder.
///
/// Each lowercased alphanumeric token and each of its character trigrams is
/// hashed into one of `dim` buckets. Words sharing a stem ("refund",
/// "refunds") therefore land close together, which is enough similarity
/// structure for tests and offline use without model weights.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn bucket(&self, feature: &str, seed: u64) -> (usize, f32) {
        let mut hasher = XxHash64::with_seed(seed);
        feature.hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h % self.dim as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token: String = token.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_lowercase).collect();
            if token.is_empty() { continue; }
            let (idx, sign) = self.bucket(&token, 0);
            v[idx] += sign;
            let padded: Vec<char> = format!("#{token}#").chars().collect();
            for tri in padded.windows(3) {
                let tri: String = tri.iter().collect();
                let (idx, sign) = self.bucket(&tri, 1);
                v[idx] += 0.5 * sign;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 1e-6 {
            for x in &mut v { *x /= norm; }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn max_len(&self) -> usize { usize::MAX }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
