//! Capability seams. The engine only talks to models through these traits.

use async_trait::async_trait;

/// Sentence embedding capability. Implementations return one vector of
/// `dim()` floats per input text.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Free-form text generation, used for query rewriting.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Raw answer-token logits for one scoring input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenLogits {
    /// Logit of the "relevant" answer token.
    pub yes: f32,
    /// Logit of the "not relevant" answer token.
    pub no: f32,
}

impl TokenLogits {
    /// Two-way softmax over the answer tokens, i.e. P(relevant).
    pub fn relevance(&self) -> f32 {
        1.0 / (1.0 + (self.no - self.yes).exp())
    }
}

/// Fine-grained relevance judge used by the reranker. Must return exactly one
/// `TokenLogits` per input, in input order.
#[async_trait]
pub trait RelevanceModel: Send + Sync {
    async fn judge(&self, inputs: &[String]) -> anyhow::Result<Vec<TokenLogits>>;
}
