//! API routes for the research agent

pub mod chat;
pub mod documents;
pub mod models;
pub mod search;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;
use crate::types::FileType;

/// Headroom over the file size limit for multipart framing, so oversized
/// files are rejected by the upload check with a clear message
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Build all API routes
pub fn api_routes(max_upload_size: u64) -> Router<AppState> {
    let upload_limit = usize::try_from(max_upload_size.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    Router::new()
        // Documents - with a larger body limit for uploads
        .route(
            "/documents/upload",
            post(documents::upload_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/documents", get(documents::list_documents))
        .route("/documents/:id", axum::routing::delete(documents::delete_document))
        // Retrieval only
        .route("/search", get(search::search))
        // Chat
        .route("/chat/session/new", post(chat::new_session))
        .route(
            "/chat/session/:id",
            get(chat::get_session).delete(chat::delete_session),
        )
        .route("/chat/message", post(chat::send_message))
        // Models
        .route("/models", get(models::list_models))
        .route("/models/select", post(models::select_model))
        .route("/ollama/status", get(models::ollama_status))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "research-agent",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Chat with uploaded documents; answers are grounded and cite their sources",
        "allowed_extensions": FileType::ALLOWED_EXTENSIONS,
        "endpoints": {
            "POST /api/documents/upload": "Upload a .pdf, .txt or .md file (multipart field 'file')",
            "GET /api/documents": "List documents, newest first",
            "DELETE /api/documents/:id": "Delete a document and its indexed chunks",
            "GET /api/search": "Retrieve relevant chunks (q, top_k, doc_ids)",
            "POST /api/chat/session/new": "Create a chat session",
            "GET /api/chat/session/:id": "Get a session's messages",
            "DELETE /api/chat/session/:id": "Delete a session",
            "POST /api/chat/message": "Send a message; answer streams as server-sent events",
            "GET /api/models": "List installed chat models",
            "POST /api/models/select": "Set the default chat model",
            "GET /api/ollama/status": "Ollama connectivity"
        }
    }))
}
