//! Vector store provider trait for storing and searching embeddings

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Chunk;

/// Search hit from the vector store
#[derive(Debug, Clone)]
pub struct VectorHit {
    /// The matched chunk (embedding omitted)
    pub chunk: Chunk,
    /// Cosine distance in [0, 2], lower is more similar
    pub distance: f32,
}

/// Restriction of a search to certain documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFilter {
    /// Search every document
    All,
    /// Equality on one document ID
    One(String),
    /// Membership in a set of document IDs
    AnyOf(Vec<String>),
}

impl DocumentFilter {
    /// No filter for `None` or an empty list, equality for one ID,
    /// membership otherwise
    pub fn from_ids(ids: Option<&[String]>) -> Self {
        match ids {
            None | Some([]) => Self::All,
            Some([only]) => Self::One(only.clone()),
            Some(many) => Self::AnyOf(many.to_vec()),
        }
    }

    pub fn matches(&self, document_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::One(id) => id == document_id,
            Self::AnyOf(ids) => ids.iter().any(|id| id == document_id),
        }
    }
}

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `LocalVectorStore`: `hnsw_rs` graph over a SQLite chunk table
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert chunks with their embeddings, replacing any with the same ID
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Nearest neighbours of `query_embedding`, ascending by distance
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<VectorHit>>;

    /// Delete all chunks for a document, returning how many were removed
    async fn delete_by_document(&self, document_id: &str) -> Result<usize>;

    /// Get total number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Check if store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
