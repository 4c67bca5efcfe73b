//! Core types for documents, retrieval, and chat

pub mod document;
pub mod query;
pub mod response;
pub mod session;

pub use document::{chunk_position, Chunk, Document, ExtractionStatus, FileType};
pub use query::{ChatRequest, SearchParams};
pub use response::{
    ChatEvent, DocumentListResponse, DocumentSummary, NewSessionResponse, SearchResponse,
    SearchResult, SessionResponse, UploadResponse,
};
pub use session::{ChatSession, Message, Role, UpsertOutcome};
