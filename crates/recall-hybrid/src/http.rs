//! OpenAI-compatible HTTP adapters for the text-generation and relevance
//! capabilities. Works against any server exposing `/chat/completions` and
//! `/completions` (llama.cpp, vLLM, Ollama, hosted APIs).

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use recall_core::config::ServiceSettings;
use recall_core::error::{Error, Result};
use recall_core::traits::{RelevanceModel, TextGenerator, TokenLogits};

/// Log-probability assumed for an answer token missing from the top list.
pub const LOGPROB_FLOOR: f32 = -30.0;

const TOP_LOGPROBS: u32 = 5;

fn build_client(settings: &ServiceSettings) -> Result<Client> {
    let mut headers = HeaderMap::new();
    if let Some(key) = settings.api_key() {
        let value = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| Error::InvalidConfig(format!("invalid API key format: {e}")))?;
        headers.insert(AUTHORIZATION, value);
    }
    Client::builder()
        .timeout(Duration::from_millis(settings.timeout_ms))
        .default_headers(headers)
        .build()
        .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{path}", base.trim_end_matches('/'))
}

async fn post_json<T: Serialize + ?Sized>(client: &Client, url: &str, body: &T) -> anyhow::Result<String> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| Error::ExternalService(format!("request to {url} failed: {e}")))?;
    let status = response.status();
    let text = response.text().await.context("reading response body")?;
    if !status.is_success() {
        return Err(Error::ExternalService(format!("{url} returned {status}: {text}")).into());
    }
    Ok(text)
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Text generation through `POST {endpoint}/chat/completions`.
pub struct HttpTextGenerator {
    client: Client,
    url: String,
    model: String,
}

impl HttpTextGenerator {
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        let url = endpoint(&settings.endpoint, "chat/completions");
        info!(url = %url, model = %settings.model, "HTTP text generator configured");
        Ok(Self { client: build_client(settings)?, url, model: settings.model.clone() })
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: 0.3,
            max_tokens: 64,
        };
        let body = post_json(&self.client, &self.url, &request).await?;
        parse_chat_reply(&body)
    }
}

fn parse_chat_reply(body: &str) -> anyhow::Result<String> {
    let response: ChatResponse = serde_json::from_str(body).context("decoding chat completion")?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::ExternalService("chat completion has no content".into()))?;
    Ok(content.trim().to_string())
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: Vec<String>,
    max_tokens: u32,
    temperature: f32,
    logprobs: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    logprobs: Option<CompletionLogprobs>,
}

#[derive(Deserialize)]
struct CompletionLogprobs {
    #[serde(default)]
    top_logprobs: Vec<HashMap<String, f32>>,
}

/// Relevance judgements through `POST {endpoint}/completions`: one answer
/// token per input, read from the top log-probabilities of `yes` and `no`.
pub struct HttpRelevanceModel {
    client: Client,
    url: String,
    model: String,
}

impl HttpRelevanceModel {
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        let url = endpoint(&settings.endpoint, "completions");
        info!(url = %url, model = %settings.model, "HTTP relevance model configured");
        Ok(Self { client: build_client(settings)?, url, model: settings.model.clone() })
    }
}

fn judge_prompt(input: &str) -> String {
    format!(
        "Judge whether the Document meets the requirements based on the Query and the Instruct provided. \
         Answer only \"yes\" or \"no\".\n\n{input}\n\nAnswer:"
    )
}

#[async_trait]
impl RelevanceModel for HttpRelevanceModel {
    async fn judge(&self, inputs: &[String]) -> anyhow::Result<Vec<TokenLogits>> {
        let request = CompletionRequest {
            model: &self.model,
            prompt: inputs.iter().map(|i| judge_prompt(i)).collect(),
            max_tokens: 1,
            temperature: 0.0,
            logprobs: TOP_LOGPROBS,
        };
        let body = post_json(&self.client, &self.url, &request).await?;
        let judged = parse_judgements(&body, inputs.len())?;
        debug!(inputs = inputs.len(), "Relevance judgements received");
        Ok(judged)
    }
}

fn parse_judgements(body: &str, expected: usize) -> anyhow::Result<Vec<TokenLogits>> {
    let response: CompletionResponse = serde_json::from_str(body).context("decoding completion")?;
    let mut choices = response.choices;
    if choices.len() != expected {
        return Err(Error::ExternalService(format!("{} completions for {expected} prompts", choices.len())).into());
    }
    choices.sort_by_key(|c| c.index);
    Ok(choices
        .iter()
        .map(|c| {
            let top = c.logprobs.as_ref().and_then(|l| l.top_logprobs.first());
            TokenLogits { yes: answer_logprob(top, "yes"), no: answer_logprob(top, "no") }
        })
        .collect())
}

/// Best log-probability among spellings of `answer` (" yes", "Yes", ...).
fn answer_logprob(top: Option<&HashMap<String, f32>>, answer: &str) -> f32 {
    top.into_iter()
        .flatten()
        .filter(|(token, _)| token.trim().eq_ignore_ascii_case(answer))
        .map(|(_, lp)| *lp)
        .fold(LOGPROB_FLOOR, f32::max)
}
