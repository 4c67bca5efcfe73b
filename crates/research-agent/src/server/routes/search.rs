//! Retrieval-only search endpoint

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{SearchParams, SearchResponse};

/// GET /api/search - Ranked chunks for a query, no generation
pub async fn search(
    State(state): State<AppState>,
    params: std::result::Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>> {
    let Query(params) = params.map_err(|e| Error::invalid_request(e.body_text()))?;
    params.validate(state.config().retrieval.max_top_k)?;

    let start = Instant::now();
    let doc_ids = params.parsed_doc_ids();
    let results = state
        .retriever()
        .search(&params.q, params.top_k, doc_ids.as_deref())
        .await?;

    tracing::info!(
        "Search \"{}\": {} results in {}ms",
        params.q,
        results.len(),
        start.elapsed().as_millis()
    );

    Ok(Json(SearchResponse::new(params.q, results)))
}
