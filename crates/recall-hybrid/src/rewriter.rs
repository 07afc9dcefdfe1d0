use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use recall_core::traits::TextGenerator;

pub const DEFAULT_REWRITE_TIMEOUT: Duration = Duration::from_secs(10);

fn prompt(query: &str) -> String {
    format!(
        "Generate 3 to 5 keywords closely related to the following search query. \
         Reply with the keywords only, separated by spaces, without explanations.\n\n\
         Query: {query}\n\nKeywords:"
    )
}

/// Best-effort query expansion. `enhance` never fails: without a generator,
/// on error, on timeout or on an empty reply it returns the query unchanged.
#[derive(Clone)]
pub struct QueryRewriter {
    generator: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl QueryRewriter {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator: Some(generator), timeout }
    }

    pub fn disabled() -> Self {
        Self { generator: None, timeout: DEFAULT_REWRITE_TIMEOUT }
    }

    pub fn is_enabled(&self) -> bool { self.generator.is_some() }

    pub async fn enhance(&self, query: &str) -> String {
        let Some(generator) = &self.generator else {
            warn!("Query rewrite requested but no text generator is configured; using original query");
            return query.to_string();
        };
        match timeout(self.timeout, generator.generate(&prompt(query))).await {
            Ok(Ok(reply)) => {
                let keywords = clean_keywords(&reply);
                if keywords.is_empty() {
                    warn!("Query rewrite returned no keywords; using original query");
                    return query.to_string();
                }
                debug!(query, keywords = %keywords, "Query expanded");
                format!("{query} {keywords}")
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Query rewrite failed; using original query");
                query.to_string()
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Query rewrite timed out; using original query");
                query.to_string()
            }
        }
    }
}

/// Flatten a model reply into space-separated keywords: list separators,
/// numbering and bullet marks are dropped.
fn clean_keywords(reply: &str) -> String {
    reply
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|t| !is_list_marker(t))
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_list_marker(token: &str) -> bool {
    let Some(body) = token.strip_suffix('.').or_else(|| token.strip_suffix(')')) else { return false };
    !body.is_empty() && body.chars().all(|c| c.is_ascii_digit())
}
