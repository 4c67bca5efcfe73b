//! In-process providers for tests, built with the `testing` feature
//!
//! `MockEmbedder` hashes words into a fixed number of buckets so texts that
//! share words land close together. `MockChat` replays a scripted answer and
//! can fail partway through.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::types::Message;

use super::embedding::EmbeddingProvider;
use super::llm::{ChatCompletionProvider, FragmentStream};

/// Deterministic bag-of-words embedder
pub struct MockEmbedder {
    dimensions: usize,
    available: AtomicBool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            available: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    /// Simulate the embedding service going away or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `embed_batch` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) as usize % self.dimensions;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::retrieval_unavailable("connection refused"));
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

/// Scripted streaming chat model
pub struct MockChat {
    fragments: Vec<String>,
    /// Fail after this many fragments have been produced
    fail_after: Option<usize>,
    /// Refuse the request outright
    unreachable: bool,
    models: Vec<String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<(String, Vec<Message>)>>,
}

impl MockChat {
    /// Answer with these fragments, in order
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            fail_after: None,
            unreachable: false,
            models: vec!["llama3.2:latest".to_string()],
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Emit `n` fragments, then fail
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Fail before producing anything
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Number of `stream_chat` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Model and messages of the most recent call
    pub fn last_request(&self) -> Option<(String, Vec<Message>)> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl ChatCompletionProvider for MockChat {
    async fn stream_chat(&self, model: &str, messages: &[Message]) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some((model.to_string(), messages.to_vec()));

        if self.unreachable {
            return Err(Error::completion_unavailable("connection refused"));
        }

        let mut items: Vec<Result<String>> = match self.fail_after {
            Some(n) => self.fragments.iter().take(n).cloned().map(Ok).collect(),
            None => self.fragments.iter().cloned().map(Ok).collect(),
        };
        if self.fail_after.is_some() {
            items.push(Err(Error::completion_unavailable("stream reset by peer")));
        }

        Ok(stream::iter(items).boxed())
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        if self.unreachable {
            return Err(Error::completion_unavailable("connection refused"));
        }
        Ok(self.models.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.unreachable)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new(16);
        let a = embedder.embed("solar panels").await.unwrap();
        let b = embedder.embed("Solar panels").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        embedder.set_available(false);
        assert!(matches!(
            embedder.embed("x").await,
            Err(Error::RetrievalUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_chat_failure_script() {
        let chat = MockChat::new(["a", "b", "c", "d"]).failing_after(3);
        let items: Vec<_> = chat
            .stream_chat("m", &[Message::user("hi")])
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 4);
        assert!(items[..3].iter().all(|i| i.is_ok()));
        assert!(items[3].is_err());
        assert_eq!(chat.calls(), 1);
    }
}
