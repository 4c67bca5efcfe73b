//! Chunk, embed, and index extracted document text

use std::sync::Arc;

use crate::error::Result;
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::types::Chunk;

use super::chunker::TextChunker;

/// Turns extracted text into indexed chunks
#[derive(Clone)]
pub struct IngestPipeline {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
}

impl IngestPipeline {
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        Self {
            chunker,
            embedder,
            store,
        }
    }

    /// Index one document's text, returning the number of chunks stored.
    ///
    /// Empty text yields zero chunks without contacting the embedder.
    pub async fn index_document(&self, document_id: &str, filename: &str, text: &str) -> Result<usize> {
        let texts = self.chunker.split(text);
        if texts.is_empty() {
            tracing::info!("No text to index for {} ({})", filename, document_id);
            return Ok(0);
        }

        tracing::debug!("Embedding {} chunks for {}", texts.len(), filename);
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let chunks = Chunk::for_document(document_id, filename, texts, embeddings);
        let count = chunks.len();
        self.store.insert_chunks(&chunks).await?;

        tracing::info!("Indexed {} chunks for {} ({})", count, filename, document_id);
        Ok(count)
    }

    /// Remove every chunk of a document from the index
    pub async fn remove_document(&self, document_id: &str) -> Result<usize> {
        let removed = self.store.delete_by_document(document_id).await?;
        tracing::debug!("Removed {} chunks for {}", removed, document_id);
        Ok(removed)
    }
}
