//! Chat model listing and selection

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::providers::OllamaStatus;
use crate::server::state::AppState;

/// Body of `GET /api/models`
#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub models: Vec<String>,
    /// Model used when a request does not name one
    pub selected: String,
}

/// Body of `POST /api/models/select`
#[derive(Debug, Deserialize)]
pub struct SelectModelRequest {
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct SelectModelResponse {
    pub selected: String,
}

/// GET /api/models - Installed chat models
pub async fn list_models(State(state): State<AppState>) -> Result<Json<ModelListResponse>> {
    let models = state.llm().list_models().await?;
    Ok(Json(ModelListResponse {
        models,
        selected: state.models().current(),
    }))
}

/// POST /api/models/select - Change the default chat model
pub async fn select_model(
    State(state): State<AppState>,
    Json(request): Json<SelectModelRequest>,
) -> Result<Json<SelectModelResponse>> {
    let requested = request.model.trim();
    if requested.is_empty() {
        return Err(Error::invalid_request("Model name must not be empty"));
    }

    let installed = state.llm().list_models().await?;
    let model = match_installed(&installed, requested)
        .ok_or_else(|| Error::ModelNotFound(requested.to_string()))?;

    state.models().select(model.clone());
    Ok(Json(SelectModelResponse { selected: model }))
}

/// GET /api/ollama/status - Connectivity report, never an error status
pub async fn ollama_status(State(state): State<AppState>) -> Json<OllamaStatus> {
    Json(OllamaStatus::from_listing(state.llm().list_models().await))
}

/// Exact name, or a bare name matching the installed `:latest` tag
fn match_installed(installed: &[String], requested: &str) -> Option<String> {
    installed
        .iter()
        .find(|name| {
            name.as_str() == requested
                || (!requested.contains(':')
                    && name.strip_suffix(":latest") == Some(requested))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_installed() {
        let installed = vec!["llama3.2:latest".to_string(), "mistral:7b".to_string()];
        assert_eq!(match_installed(&installed, "llama3.2"), Some("llama3.2:latest".into()));
        assert_eq!(match_installed(&installed, "mistral:7b"), Some("mistral:7b".into()));
        assert_eq!(match_installed(&installed, "mistral"), None);
        assert_eq!(match_installed(&installed, "phi3"), None);
    }
}
