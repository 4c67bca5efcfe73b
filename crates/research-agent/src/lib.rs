//! research-agent: chat with uploaded documents
//!
//! Uploads (PDF, plain text, markdown) are extracted, chunked, embedded
//! through Ollama, and indexed in SQLite. Chat turns retrieve the most
//! relevant chunks, stream a grounded answer that cites them as `[Doc N]`,
//! close with a sources footer, and persist the exchange per session.

pub mod chat;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use config::AgentConfig;
pub use error::{Error, ErrorKind, Result};
pub use generation::{Fragment, RagPipeline};
pub use server::{state::AppState, RagServer};
pub use types::{ChatEvent, ChatRequest, Chunk, Document, Message, SearchResult};
