//! Ollama-based providers for embeddings and chat completion
//!
//! A single `OllamaClient` speaks the HTTP API; `OllamaEmbedder` and
//! `OllamaChat` wrap a shared client to implement the provider traits.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};
use crate::types::Message;

use super::embedding::{validate_embeddings, EmbeddingProvider};
use super::llm::{ChatCompletionProvider, FragmentStream};

/// Ollama API client
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Base URL without trailing slash
    base_url: String,
    /// Timeout for non-streaming calls
    request_timeout: Duration,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

/// One NDJSON line of a streamed `/api/chat` response
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChatChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

/// Reachability report for `GET /api/ollama/status`
#[derive(Debug, Clone, Serialize)]
pub struct OllamaStatus {
    /// "connected" or "disconnected"
    pub status: &'static str,
    pub models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OllamaStatus {
    /// Build a report from the outcome of a model listing
    pub fn from_listing(listing: Result<Vec<String>>) -> Self {
        match listing {
            Ok(models) => Self {
                status: "connected",
                models,
                error: None,
            },
            Err(e) => Self {
                status: "disconnected",
                models: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: &LlmConfig) -> Result<Self> {
        // No overall timeout: chat streams run as long as the model generates
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Embed a batch of texts in one request
    pub async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(&EmbedRequest { model, input: texts })
            .send()
            .await
            .map_err(|e| Error::retrieval_unavailable(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::retrieval_unavailable(format!(
                "Embedding failed: HTTP {} - {}",
                status, body
            )));
        }

        let embed_response: EmbedResponse = response.json().await.map_err(|e| {
            Error::retrieval_unavailable(format!("Failed to parse embedding response: {}", e))
        })?;

        Ok(embed_response.embeddings)
    }

    /// Names of installed models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| Error::completion_unavailable(format!("Cannot reach Ollama: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::completion_unavailable(format!(
                "Listing models failed: HTTP {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response.json().await.map_err(|e| {
            Error::completion_unavailable(format!("Failed to parse model list: {}", e))
        })?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Connection status with installed models, never an error
    pub async fn status(&self) -> OllamaStatus {
        OllamaStatus::from_listing(self.list_models().await)
    }

    /// Start a streamed chat completion
    pub async fn chat_stream(&self, model: &str, messages: &[Message]) -> Result<FragmentStream> {
        let url = format!("{}/api/chat", self.base_url);

        tracing::debug!("Streaming chat with model {} ({} messages)", model, messages.len());

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest {
                model,
                messages,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| Error::completion_unavailable(format!("Chat request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::completion_unavailable(format!(
                "Chat failed: HTTP {} - {}",
                status, body
            )));
        }

        Ok(decode_chat_stream(response.bytes_stream().boxed()))
    }
}

/// Splits a byte stream into complete lines.
///
/// Network chunks do not respect NDJSON line boundaries, so a partial line is
/// held until the rest of it arrives.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and return every line they complete
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Whatever is left once the stream ends
    pub fn finish(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buf).trim().to_string();
        self.buf.clear();
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    }
}

struct ChatStreamState {
    upstream: BoxStream<'static, reqwest::Result<Bytes>>,
    lines: LineBuffer,
    pending: VecDeque<Result<String>>,
    saw_done: bool,
    finished: bool,
}

impl ChatStreamState {
    fn accept_line(&mut self, line: &str) {
        if self.saw_done {
            return;
        }

        match serde_json::from_str::<ChatChunk>(line) {
            Ok(chunk) => {
                if let Some(error) = chunk.error {
                    self.pending
                        .push_back(Err(Error::completion_unavailable(error)));
                    return;
                }
                if let Some(message) = chunk.message {
                    // Empty keep-alive fragments are not relayed
                    if !message.content.is_empty() {
                        self.pending.push_back(Ok(message.content));
                    }
                }
                if chunk.done {
                    self.saw_done = true;
                }
            }
            Err(e) => {
                self.pending.push_back(Err(Error::completion_unavailable(format!(
                    "Malformed stream line: {}",
                    e
                ))));
            }
        }
    }
}

/// Turn a raw `/api/chat` byte stream into content fragments.
///
/// Ends after the `done` line. A transport error, an `error` line, a
/// malformed line, or an end of input without `done` yields one `Err`
/// and ends the stream.
fn decode_chat_stream(upstream: BoxStream<'static, reqwest::Result<Bytes>>) -> FragmentStream {
    let state = ChatStreamState {
        upstream,
        lines: LineBuffer::default(),
        pending: VecDeque::new(),
        saw_done: false,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.pending.clear();
                    state.finished = true;
                }
                return Some((item, state));
            }

            if state.finished || state.saw_done {
                return None;
            }

            match state.upstream.next().await {
                Some(Ok(bytes)) => {
                    for line in state.lines.push(&bytes) {
                        state.accept_line(&line);
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((
                        Err(Error::completion_unavailable(format!("Stream interrupted: {}", e))),
                        state,
                    ));
                }
                None => {
                    state.finished = true;
                    if let Some(line) = state.lines.finish() {
                        state.accept_line(&line);
                    }
                    if !state.saw_done && state.pending.iter().all(|item| item.is_ok()) {
                        state.pending.push_back(Err(Error::completion_unavailable(
                            "Chat stream ended before completion",
                        )));
                    }
                }
            }
        }
    })
    .boxed()
}

/// Ollama embedding provider
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl OllamaEmbedder {
    /// Create from an existing OllamaClient
    pub fn new(client: Arc<OllamaClient>, config: &EmbeddingConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let vectors = self.client.embed(&self.model, batch).await?;
            validate_embeddings(&vectors, batch.len(), self.dimensions)?;
            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama chat completion provider
pub struct OllamaChat {
    client: Arc<OllamaClient>,
}

impl OllamaChat {
    pub fn new(client: Arc<OllamaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatCompletionProvider for OllamaChat {
    async fn stream_chat(&self, model: &str, messages: &[Message]) -> Result<FragmentStream> {
        self.client.chat_stream(model, messages).await
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        self.client.list_models().await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_stream(parts: Vec<&'static str>) -> BoxStream<'static, reqwest::Result<Bytes>> {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p.as_bytes())))).boxed()
    }

    async fn collect(parts: Vec<&'static str>) -> Vec<Result<String>> {
        decode_chat_stream(byte_stream(parts)).collect().await
    }

    #[test]
    fn test_line_buffer_carries_partial_lines() {
        let mut lines = LineBuffer::default();
        assert!(lines.push(b"{\"a\":").is_empty());
        assert_eq!(lines.push(b"1}\n{\"b\""), vec!["{\"a\":1}"]);
        assert_eq!(lines.push(b":2}\n\n"), vec!["{\"b\":2}"]);
        assert_eq!(lines.finish(), None);
    }

    #[tokio::test]
    async fn test_decode_split_across_chunks() {
        let items = collect(vec![
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n{\"mess",
            "age\":{\"role\":\"assistant\",\"content\":\"lo\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        ])
        .await;

        let fragments: Vec<String> = items.into_iter().map(|i| i.unwrap()).collect();
        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_decode_error_line_terminates() {
        let items = collect(vec![
            "{\"message\":{\"content\":\"partial\"},\"done\":false}\n",
            "{\"error\":\"model crashed\"}\n",
            "{\"message\":{\"content\":\"ignored\"},\"done\":false}\n",
        ])
        .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(matches!(items[1], Err(Error::CompletionUnavailable(_))));
    }

    #[tokio::test]
    async fn test_decode_truncated_stream_is_an_error() {
        let items = collect(vec!["{\"message\":{\"content\":\"cut\"},\"done\":false}\n"]).await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_decode_final_line_without_newline() {
        let items = collect(vec!["{\"message\":{\"content\":\"x\"},\"done\":true}"]).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap(), "x");
    }

    #[test]
    fn test_status_serialization() {
        let status = OllamaStatus {
            status: "connected",
            models: vec!["llama3.2:latest".into()],
            error: None,
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "connected");
        assert!(value.get("error").is_none());
    }
}
