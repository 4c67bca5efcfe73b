//! Document upload, listing, and deletion

use axum::{
    extract::{multipart::Field, multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::ingestion::{extract_text, validator};
use crate::server::state::AppState;
use crate::types::{Document, DocumentListResponse, DocumentSummary, ExtractionStatus, UploadResponse};

/// Body of `DELETE /api/documents/:id`
#[derive(Debug, Serialize)]
pub struct DeleteDocumentResponse {
    pub message: String,
    pub id: String,
}

/// POST /api/documents/upload - Store, extract, and index one file
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let max_bytes = state.config().server.max_upload_size;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| Error::invalid_request("Upload is missing a filename"))?;

        let document = ingest_upload(&state, &filename, field).await?;
        return Ok(Json(UploadResponse::from(&document)));
    }

    Err(Error::invalid_request("Missing multipart field 'file'"))
}

/// Validation, storage, extraction, and indexing for one upload.
///
/// Nothing is registered unless every step succeeds; a failure after the
/// file is staged removes the file, the text artifact, and any vectors.
async fn ingest_upload(state: &AppState, filename: &str, field: Field<'_>) -> Result<Document> {
    let start = Instant::now();
    let file_type = validator::validate_extension(filename)?;
    let id = Document::new_id();
    let max_bytes = state.config().server.max_upload_size;

    let body = field.map(|chunk| chunk.map_err(|e| multipart_error(e, max_bytes)));
    let staged = state
        .documents()
        .stage_upload(&id, filename, file_type, body, max_bytes)
        .await?;
    tracing::info!("Received {} ({} bytes) as {}", filename, staged.size, id);

    let text = extract_text(&staged.path, file_type.extension()).await;
    let extraction_status = ExtractionStatus::from_extracted(&text);
    if extraction_status == ExtractionStatus::Failed {
        tracing::warn!("No text extracted from {}", filename);
    }

    let text_path = state.documents().text_path(&id);
    let indexed = async {
        state.documents().save_text(&id, &text).await?;
        let chunk_count = state.ingest().index_document(&id, filename, &text).await?;

        let document = Document {
            id: id.clone(),
            filename: filename.to_string(),
            size: staged.size,
            upload_date: Utc::now(),
            file_path: staged.path.clone(),
            text_path: text_path.clone(),
            extraction_status,
            chunk_count,
        };
        state.documents().register(&document).await?;
        Ok::<_, Error>(document)
    }
    .await;

    match indexed {
        Ok(document) => {
            tracing::info!(
                "Ingested {} in {}ms: {} chunks, extraction {}",
                filename,
                start.elapsed().as_millis(),
                document.chunk_count,
                document.extraction_status.as_str()
            );
            Ok(document)
        }
        Err(e) => {
            tracing::error!("Ingestion of {} failed, rolling back: {}", filename, e);
            state.documents().discard_files(&staged.path, &text_path).await;
            if let Err(cleanup) = state.ingest().remove_document(&id).await {
                tracing::warn!("Failed to remove vectors for {}: {}", id, cleanup);
            }
            Err(e)
        }
    }
}

/// GET /api/documents - All documents, newest first
pub async fn list_documents(State(state): State<AppState>) -> Result<Json<DocumentListResponse>> {
    let documents = state.documents().list().await?;
    Ok(Json(DocumentListResponse {
        documents: documents.iter().map(DocumentSummary::from).collect(),
    }))
}

/// DELETE /api/documents/:id - Remove record, files, and vectors
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteDocumentResponse>> {
    if state.documents().get(&id).await?.is_none() {
        return Err(Error::DocumentNotFound(id));
    }

    // Vectors go before the record
    let removed = state.ingest().remove_document(&id).await?;
    let document = state
        .documents()
        .delete(&id)
        .await?
        .ok_or_else(|| Error::DocumentNotFound(id.clone()))?;

    tracing::info!("Deleted {} ({}), {} chunks", document.filename, id, removed);

    Ok(Json(DeleteDocumentResponse {
        message: "Document deleted successfully".to_string(),
        id,
    }))
}

fn multipart_error(err: MultipartError, max_bytes: u64) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::FileTooLarge { max_bytes }
    } else {
        Error::invalid_request(format!("Invalid multipart body: {}", err.body_text()))
    }
}
