//! Response types for search, documents, and chat streams

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::{Document, ExtractionStatus};
use super::session::{ChatSession, Message};
use crate::error::{Error, ErrorKind};

/// One retrieved chunk with source attribution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Chunk text
    pub text: String,
    /// Original filename of the source document
    pub source_filename: String,
    /// Source document ID
    pub source_doc_id: String,
    /// Position within the document, e.g. "3/15"
    pub chunk_position: String,
    /// Relevance in (0, 1], higher is better
    pub relevance_score: f32,
}

/// Body of `GET /api/search`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total_results: usize,
}

impl SearchResponse {
    pub fn new(query: impl Into<String>, results: Vec<SearchResult>) -> Self {
        Self {
            query: query.into(),
            total_results: results.len(),
            results,
        }
    }
}

/// Public document metadata (no internal paths)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub filename: String,
    pub size: u64,
    pub upload_date: DateTime<Utc>,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            filename: doc.filename.clone(),
            size: doc.size,
            upload_date: doc.upload_date,
        }
    }
}

/// Body of `GET /api/documents`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentSummary>,
}

/// Body returned after a successful upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    pub filename: String,
    pub size: u64,
    pub upload_date: DateTime<Utc>,
    pub extraction_status: ExtractionStatus,
    pub chunk_count: usize,
}

impl From<&Document> for UploadResponse {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            filename: doc.filename.clone(),
            size: doc.size,
            upload_date: doc.upload_date,
            extraction_status: doc.extraction_status,
            chunk_count: doc.chunk_count,
        }
    }
}

/// Body of `POST /api/chat/session/new`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionResponse {
    pub session_id: String,
}

/// Body of `GET /api/chat/session/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ChatSession> for SessionResponse {
    fn from(session: ChatSession) -> Self {
        Self {
            session_id: session.id,
            messages: session.messages,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

/// One server-sent event of a chat turn.
///
/// Serializes to exactly one of `{"content"}`, `{"done"}` or `{"error"}`;
/// error events also carry `kind` and `retryable`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ChatEvent {
    Content {
        content: String,
    },
    Done {
        done: bool,
    },
    Error {
        error: String,
        kind: ErrorKind,
        retryable: bool,
    },
}

impl ChatEvent {
    pub fn content(fragment: impl Into<String>) -> Self {
        Self::Content {
            content: fragment.into(),
        }
    }

    pub fn done() -> Self {
        Self::Done { done: true }
    }

    pub fn error(err: &Error) -> Self {
        let kind = err.kind();
        Self::Error {
            error: err.to_string(),
            kind,
            retryable: kind.retryable(),
        }
    }

    /// `done` and `error` end the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Content { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_event_wire_format() {
        assert_eq!(
            serde_json::to_value(ChatEvent::content("Hello")).unwrap(),
            json!({"content": "Hello"})
        );
        assert_eq!(serde_json::to_value(ChatEvent::done()).unwrap(), json!({"done": true}));

        let err = Error::completion_unavailable("connection reset");
        let value = serde_json::to_value(ChatEvent::error(&err)).unwrap();
        assert_eq!(value["kind"], "completion_unavailable");
        assert_eq!(value["retryable"], true);
        assert!(value["error"].as_str().unwrap().contains("connection reset"));
        assert!(value.get("content").is_none());
        assert!(value.get("done").is_none());
    }

    #[test]
    fn test_chat_event_terminal() {
        assert!(!ChatEvent::content("x").is_terminal());
        assert!(ChatEvent::done().is_terminal());
        assert!(ChatEvent::error(&Error::internal("boom")).is_terminal());
    }

    #[test]
    fn test_search_response_counts_results() {
        let response = SearchResponse::new("q", vec![]);
        assert_eq!(response.total_results, 0);
        assert_eq!(serde_json::to_value(&response).unwrap()["query"], "q");
    }
}
