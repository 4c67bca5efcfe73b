//! Chat model selection

use parking_lot::RwLock;

/// Resolves which chat model serves a request.
///
/// Fallback chain: the request's explicit model, then the last model set
/// through `select`, then the configured default. The result is resolved
/// once per request and passed by value into generation.
#[derive(Debug)]
pub struct ModelSelection {
    default_model: String,
    selected: RwLock<Option<String>>,
}

impl ModelSelection {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            default_model: default_model.into(),
            selected: RwLock::new(None),
        }
    }

    /// Model for one request
    pub fn resolve(&self, requested: Option<&str>) -> String {
        if let Some(model) = requested.map(str::trim).filter(|m| !m.is_empty()) {
            return model.to_string();
        }
        self.current()
    }

    /// Last selected model, or the configured default
    pub fn current(&self) -> String {
        self.selected
            .read()
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Record a new default for later requests
    pub fn select(&self, model: impl Into<String>) {
        let model = model.into();
        tracing::info!("Selected chat model: {}", model);
        *self.selected.write() = Some(model);
    }
}
