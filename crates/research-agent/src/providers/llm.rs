//! Chat completion provider trait for streaming answers

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::Message;

/// Lazily produced text fragments of one completion.
///
/// Finite; ends after the last fragment or after the first error. Dropping
/// it releases the upstream connection.
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Trait for streaming chat completion
///
/// Implementations:
/// - `OllamaChat`: Local Ollama server (`/api/chat`)
#[async_trait]
pub trait ChatCompletionProvider: Send + Sync {
    /// Start a streamed completion over an ordered message list.
    ///
    /// Connection and HTTP status failures are returned here, before any
    /// fragment; failures after the first fragment arrive as an `Err` item.
    async fn stream_chat(&self, model: &str, messages: &[Message]) -> Result<FragmentStream>;

    /// Models installed on the backend
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
