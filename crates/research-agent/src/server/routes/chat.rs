//! Chat sessions and streamed chat turns

use axum::{
    extract::{Path, State},
    http::{header, HeaderName},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::StreamExt;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{ChatRequest, NewSessionResponse, SessionResponse};

/// Body of `DELETE /api/chat/session/:id`
#[derive(Debug, Serialize)]
pub struct DeleteSessionResponse {
    /// "deleted" or "not_found"
    pub status: &'static str,
    pub session_id: String,
}

/// POST /api/chat/session/new - Create an empty session
pub async fn new_session(State(state): State<AppState>) -> Result<Json<NewSessionResponse>> {
    let session = state.sessions().create().await?;
    Ok(Json(NewSessionResponse {
        session_id: session.id,
    }))
}

/// GET /api/chat/session/:id - Session with its messages
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>> {
    state
        .sessions()
        .get(&id)
        .await?
        .map(|session| Json(SessionResponse::from(session)))
        .ok_or(Error::SessionNotFound(id))
}

/// DELETE /api/chat/session/:id - Idempotent delete
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteSessionResponse>> {
    let status = if state.sessions().delete(&id).await? {
        "deleted"
    } else {
        "not_found"
    };

    Ok(Json(DeleteSessionResponse {
        status,
        session_id: id,
    }))
}

/// POST /api/chat/message - Answer as a server-sent event stream.
///
/// Invalid requests are rejected with 400 before the stream opens. After
/// that, every outcome is reported inside the stream.
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse> {
    request.validate(state.config().retrieval.max_top_k)?;

    let events = state
        .chat()
        .start(request, state.models())
        .await?
        .map(|event| Event::default().json_data(event));

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(events).keep_alive(KeepAlive::default()),
    ))
}
