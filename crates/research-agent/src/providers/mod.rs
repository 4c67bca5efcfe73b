//! Provider abstractions for embeddings, chat completion, and vector storage
//!
//! This module provides trait-based abstractions so the pipeline can run
//! against a local Ollama server and SQLite index, or against test doubles.

pub mod embedding;
pub mod llm;
pub mod local;
#[cfg(any(test, feature = "testing"))]
pub mod mock;
pub mod ollama;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::{ChatCompletionProvider, FragmentStream};
pub use local::LocalVectorStore;
pub use ollama::{OllamaChat, OllamaClient, OllamaEmbedder, OllamaStatus};
pub use vector_store::{DocumentFilter, VectorHit, VectorStoreProvider};
