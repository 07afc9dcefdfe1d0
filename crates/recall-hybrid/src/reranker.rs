use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info};

use recall_core::error::{Error, Result};
use recall_core::traits::{RelevanceModel, TokenLogits};
use recall_core::types::{ScoreSource, SearchResult};

pub const DEFAULT_INSTRUCTION: &str = "Given a search query, retrieve relevant passages that answer the query";
pub const DEFAULT_BATCH_SIZE: usize = 8;
pub const DEFAULT_RERANK_TIMEOUT: Duration = Duration::from_secs(30);

/// Re-scores merged candidates with a relevance model.
///
/// Unlike query rewriting there is no fallback: if the model cannot judge
/// every candidate within the timeout the whole call is `ModelUnavailable`.
#[derive(Clone)]
pub struct Reranker {
    model: Arc<dyn RelevanceModel>,
    instruction: String,
    batch_size: usize,
    timeout: Duration,
}

impl Reranker {
    pub fn new(model: Arc<dyn RelevanceModel>) -> Self {
        Self {
            model,
            instruction: DEFAULT_INSTRUCTION.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: DEFAULT_RERANK_TIMEOUT,
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn batch_size(&self) -> usize { self.batch_size }

    /// The text the relevance model judges for one (query, document) pair.
    pub fn scoring_input(&self, query: &str, document: &str) -> String {
        format!("<Instruct>: {}\n<Query>: {query}\n<Document>: {document}", self.instruction)
    }

    /// Score every candidate against `query` and sort best-first. Equal
    /// scores keep their incoming order.
    pub async fn rerank(&self, query: &str, mut candidates: Vec<SearchResult>) -> Result<Vec<SearchResult>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let inputs: Vec<String> = candidates.iter().map(|c| self.scoring_input(query, c.text())).collect();
        let scores = timeout(self.timeout, self.score_all(&inputs))
            .await
            .map_err(|_| Error::ModelUnavailable(format!("reranker timed out after {} ms", self.timeout.as_millis())))??;

        for (candidate, score) in candidates.iter_mut().zip(scores) {
            candidate.score = score;
            candidate.source = ScoreSource::Reranked;
        }
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        info!(candidates = candidates.len(), "Reranked");
        Ok(candidates)
    }

    async fn score_all(&self, inputs: &[String]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(inputs.len());
        for (n, batch) in inputs.chunks(self.batch_size).enumerate() {
            let judged = self
                .model
                .judge(batch)
                .await
                .map_err(|e| Error::ModelUnavailable(format!("relevance model failed: {e}")))?;
            if judged.len() != batch.len() {
                return Err(Error::ModelUnavailable(format!(
                    "relevance model returned {} judgements for {} inputs",
                    judged.len(),
                    batch.len()
                )));
            }
            debug!(batch = n, size = batch.len(), "Relevance batch scored");
            scores.extend(judged.iter().map(TokenLogits::relevance));
        }
        Ok(scores)
    }
}
