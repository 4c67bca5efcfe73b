//! Error types for the research agent

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Research agent errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upload with an extension outside the allow-list
    #[error("Invalid file type '{0}'. Allowed: .pdf, .txt, .md")]
    UnsupportedFileType(String),

    /// Upload larger than the configured limit
    #[error("File too large. Maximum size: {max_bytes} bytes")]
    FileTooLarge { max_bytes: u64 },

    /// Upload whose bytes do not match the declared type
    #[error("Invalid file content. File does not match expected type: {0}")]
    InvalidFileContent(String),

    /// Embedding service unreachable or returned a malformed response
    #[error("Embedding service unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Chat completion service unreachable or failed mid-stream
    #[error("Completion service unavailable: {0}")]
    CompletionUnavailable(String),

    /// Embedding had the wrong number of dimensions
    #[error("Expected {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector index error
    #[error("Vector database error: {0}")]
    VectorDb(String),

    /// Relational storage error
    #[error("Database error: {0}")]
    Database(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Chat session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Requested model is not installed
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a retrieval-unavailable error
    pub fn retrieval_unavailable(message: impl Into<String>) -> Self {
        Self::RetrievalUnavailable(message.into())
    }

    /// Create a completion-unavailable error
    pub fn completion_unavailable(message: impl Into<String>) -> Self {
        Self::CompletionUnavailable(message.into())
    }

    /// Create a vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Machine-readable classification used on streaming boundaries
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::RetrievalUnavailable(_) | Error::DimensionMismatch { .. } => {
                ErrorKind::RetrievalUnavailable
            }
            Error::CompletionUnavailable(_) | Error::Http(_) | Error::ModelNotFound(_) => {
                ErrorKind::CompletionUnavailable
            }
            Error::VectorDb(_) | Error::Database(_) | Error::Io(_) => ErrorKind::Storage,
            Error::InvalidRequest(_)
            | Error::UnsupportedFileType(_)
            | Error::FileTooLarge { .. }
            | Error::InvalidFileContent(_)
            | Error::DocumentNotFound(_)
            | Error::SessionNotFound(_) => ErrorKind::InvalidRequest,
            Error::Config(_) | Error::Json(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err.to_string())
    }
}

/// Error classification carried by terminal stream events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Embedding provider failed; distinct from "no results"
    RetrievalUnavailable,
    /// Chat completion provider failed
    CompletionUnavailable,
    /// Local persistence failed
    Storage,
    /// Caller sent something unusable
    InvalidRequest,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Whether the same request may succeed if retried later
    pub fn retryable(self) -> bool {
        matches!(self, Self::RetrievalUnavailable | Self::CompletionUnavailable)
    }

    /// Stable wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RetrievalUnavailable => "retrieval_unavailable",
            Self::CompletionUnavailable => "completion_unavailable",
            Self::Storage => "storage",
            Self::InvalidRequest => "invalid_request",
            Self::Internal => "internal",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg.clone()),
            Error::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg.clone()),
            Error::UnsupportedFileType(_) => {
                (StatusCode::BAD_REQUEST, "unsupported_type", self.to_string())
            }
            Error::FileTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "file_too_large", self.to_string())
            }
            Error::InvalidFileContent(_) => {
                (StatusCode::BAD_REQUEST, "invalid_content", self.to_string())
            }
            Error::RetrievalUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "retrieval_unavailable",
                "Embedding service unavailable. Please ensure Ollama is running.".to_string(),
            ),
            Error::CompletionUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "completion_unavailable", msg.clone())
            }
            Error::DimensionMismatch { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "embedding_error", self.to_string())
            }
            Error::VectorDb(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "vector_db_error", msg.clone())
            }
            Error::Database(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", msg.clone())
            }
            Error::DocumentNotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found", "Document not found".to_string())
            }
            Error::SessionNotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found", "Session not found".to_string())
            }
            Error::ModelNotFound(model) => (
                StatusCode::NOT_FOUND,
                "model_not_found",
                format!("Model not found: {}", model),
            ),
            Error::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error", err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "json_error", err.to_string()),
            Error::Http(err) => (StatusCode::BAD_GATEWAY, "http_error", err.to_string()),
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        if status.is_server_error() {
            tracing::error!("{} ({}): {}", status, error_type, self);
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
