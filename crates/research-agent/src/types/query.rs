//! Request types for search and chat

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_top_k() -> usize {
    5
}

/// Query string of `GET /api/search`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Search query text
    #[serde(default)]
    pub q: String,

    /// Maximum results to return
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Comma-separated document IDs to filter by
    #[serde(default)]
    pub doc_ids: Option<String>,
}

impl SearchParams {
    /// Reject requests before any pipeline work begins
    pub fn validate(&self, max_top_k: usize) -> Result<()> {
        if self.q.trim().is_empty() {
            return Err(Error::invalid_request("Query parameter 'q' must not be empty"));
        }
        validate_top_k(self.top_k, max_top_k)
    }

    /// Split the comma-separated filter; blank entries are dropped and an
    /// all-blank filter means "no filter"
    pub fn parsed_doc_ids(&self) -> Option<Vec<String>> {
        let ids: Vec<String> = self
            .doc_ids
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect();

        if ids.is_empty() {
            None
        } else {
            Some(ids)
        }
    }
}

/// Body of `POST /api/chat/message`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,

    /// Session the turn belongs to (created on first write if absent)
    pub session_id: String,

    /// Number of chunks to retrieve (default: 5)
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Chat model for this turn only
    #[serde(default)]
    pub model: Option<String>,

    /// Restrict retrieval to these documents
    #[serde(default)]
    pub doc_ids: Option<Vec<String>>,
}

impl ChatRequest {
    /// Create a new chat request with default retrieval settings
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: session_id.into(),
            top_k: default_top_k(),
            model: None,
            doc_ids: None,
        }
    }

    /// Set the number of chunks to retrieve
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// Use a specific model for this turn
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Filter by document IDs
    pub fn with_documents(mut self, doc_ids: Vec<String>) -> Self {
        self.doc_ids = Some(doc_ids);
        self
    }

    /// Reject requests before the event stream opens
    pub fn validate(&self, max_top_k: usize) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(Error::invalid_request("Message must not be empty"));
        }
        if self.session_id.trim().is_empty() {
            return Err(Error::invalid_request("session_id must not be empty"));
        }
        validate_top_k(self.top_k, max_top_k)
    }

    /// Document filter with blank IDs removed; empty means "no filter"
    pub fn doc_filter(&self) -> Option<Vec<String>> {
        let ids: Vec<String> = self
            .doc_ids
            .iter()
            .flatten()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect();

        if ids.is_empty() {
            None
        } else {
            Some(ids)
        }
    }
}

fn validate_top_k(top_k: usize, max_top_k: usize) -> Result<()> {
    if top_k == 0 || top_k > max_top_k {
        return Err(Error::invalid_request(format!(
            "top_k must be between 1 and {}",
            max_top_k
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(q: &str, top_k: usize, doc_ids: Option<&str>) -> SearchParams {
        SearchParams {
            q: q.to_string(),
            top_k,
            doc_ids: doc_ids.map(String::from),
        }
    }

    #[test]
    fn test_search_params_validation() {
        assert!(params("climate", 5, None).validate(20).is_ok());
        assert!(params("   ", 5, None).validate(20).is_err());
        assert!(params("climate", 0, None).validate(20).is_err());
        assert!(params("climate", 21, None).validate(20).is_err());
        assert!(params("climate", 20, None).validate(20).is_ok());
    }

    #[test]
    fn test_parsed_doc_ids() {
        assert_eq!(params("q", 5, None).parsed_doc_ids(), None);
        assert_eq!(params("q", 5, Some(" , ")).parsed_doc_ids(), None);
        assert_eq!(
            params("q", 5, Some("a, b,,c ")).parsed_doc_ids(),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_chat_request_defaults() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"message": "hi", "session_id": "s1"}"#).unwrap();
        assert_eq!(request.top_k, 5);
        assert!(request.model.is_none());
        assert!(request.doc_filter().is_none());
        assert!(request.validate(20).is_ok());
    }

    #[test]
    fn test_chat_request_validation() {
        assert!(ChatRequest::new("s1", "").validate(20).is_err());
        assert!(ChatRequest::new("", "hello").validate(20).is_err());
        assert!(ChatRequest::new("s1", "hello").with_top_k(0).validate(20).is_err());
        let filtered = ChatRequest::new("s1", "hello").with_documents(vec![" ".into(), "d1".into()]);
        assert_eq!(filtered.doc_filter(), Some(vec!["d1".to_string()]));
    }
}
