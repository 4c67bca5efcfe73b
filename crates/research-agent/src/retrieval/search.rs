//! Retrieval orchestrator: embed a query, search the index, score the hits

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{DocumentFilter, EmbeddingProvider, VectorHit, VectorStoreProvider};
use crate::types::SearchResult;

/// Placeholder for hits whose source filename is missing
pub const UNKNOWN_DOCUMENT: &str = "Unknown Document";

/// Map a distance to a relevance score in (0, 1]; 1.0 at distance 0
pub fn relevance_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Retrieval orchestrator
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStoreProvider>) -> Self {
        Self { embedder, store }
    }

    /// Find the `top_k` chunks most relevant to `query`, best first.
    ///
    /// An empty index yields an empty list. Embedding failures surface as
    /// `Error::RetrievalUnavailable` so callers never mistake an outage for
    /// "no results".
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        doc_ids: Option<&[String]>,
    ) -> Result<Vec<SearchResult>> {
        // A malformed embedding counts as an outage, same as no response
        let query_embedding = self.embedder.embed(query).await.map_err(|e| match e {
            Error::RetrievalUnavailable(_) => e,
            other => Error::retrieval_unavailable(other.to_string()),
        })?;

        let filter = DocumentFilter::from_ids(doc_ids);
        let hits = self.store.search(&query_embedding, top_k, &filter).await?;

        tracing::debug!(
            "Retrieved {} hits for top_k={} ({:?})",
            hits.len(),
            top_k,
            filter
        );

        let mut results: Vec<SearchResult> = hits.into_iter().map(to_search_result).collect();

        // Index order is not trusted
        results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        Ok(results)
    }
}

fn to_search_result(hit: VectorHit) -> SearchResult {
    let VectorHit { chunk, distance } = hit;
    let chunk_position = chunk.position();

    let source_filename = if chunk.filename.trim().is_empty() {
        UNKNOWN_DOCUMENT.to_string()
    } else {
        chunk.filename
    };

    SearchResult {
        chunk_position,
        text: chunk.text,
        source_filename,
        source_doc_id: chunk.document_id,
        relevance_score: relevance_score(distance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockEmbedder;
    use crate::providers::LocalVectorStore;
    use crate::types::Chunk;
    use async_trait::async_trait;

    /// Returns canned hits in a fixed (possibly wrong) order
    struct CannedStore {
        hits: Vec<VectorHit>,
    }

    #[async_trait]
    impl VectorStoreProvider for CannedStore {
        async fn insert_chunks(&self, _chunks: &[Chunk]) -> Result<()> {
            Ok(())
        }

        async fn search(
            &self,
            _query_embedding: &[f32],
            top_k: usize,
            filter: &DocumentFilter,
        ) -> Result<Vec<VectorHit>> {
            Ok(self
                .hits
                .iter()
                .filter(|h| filter.matches(&h.chunk.document_id))
                .take(top_k)
                .cloned()
                .collect())
        }

        async fn delete_by_document(&self, _document_id: &str) -> Result<usize> {
            Ok(0)
        }

        async fn len(&self) -> Result<usize> {
            Ok(self.hits.len())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn hit(doc: &str, filename: &str, index: usize, total: usize, distance: f32) -> VectorHit {
        VectorHit {
            chunk: Chunk {
                document_id: doc.to_string(),
                filename: filename.to_string(),
                chunk_index: index,
                total_chunks: total,
                text: format!("text {}", index),
                embedding: Vec::new(),
            },
            distance,
        }
    }

    fn retriever(hits: Vec<VectorHit>) -> Retriever {
        Retriever::new(
            Arc::new(MockEmbedder::new(8)),
            Arc::new(CannedStore { hits }),
        )
    }

    #[test]
    fn test_relevance_score() {
        assert_eq!(relevance_score(0.0), 1.0);
        assert!((relevance_score(0.1) - 0.909).abs() < 1e-3);
        assert!((relevance_score(1.5) - 0.4).abs() < 1e-6);

        let mut previous = relevance_score(0.0);
        for step in 1..=40 {
            let score = relevance_score(step as f32 * 0.05);
            assert!(score < previous);
            assert!(score > 0.0 && score <= 1.0);
            previous = score;
        }
    }

    #[tokio::test]
    async fn test_two_chunk_scenario_is_resorted() {
        // Index hands back the weak match first
        let retriever = retriever(vec![
            hit("doc", "paper.pdf", 0, 2, 1.5),
            hit("doc", "paper.pdf", 1, 2, 0.1),
        ]);

        let results = retriever.search("query", 5, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_position, "2/2");
        assert!((results[0].relevance_score - 0.909).abs() < 1e-3);
        assert_eq!(results[1].chunk_position, "1/2");
        assert!((results[1].relevance_score - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_missing_filename_placeholder() {
        let retriever = retriever(vec![hit("doc", "", 0, 1, 0.2)]);
        let results = retriever.search("query", 5, None).await.unwrap();
        assert_eq!(results[0].source_filename, UNKNOWN_DOCUMENT);
    }

    #[tokio::test]
    async fn test_filter_membership() {
        let retriever = retriever(vec![
            hit("a", "a.txt", 0, 1, 0.1),
            hit("b", "b.txt", 0, 1, 0.2),
            hit("c", "c.txt", 0, 1, 0.3),
        ]);

        let filter = vec!["a".to_string(), "c".to_string()];
        let results = retriever.search("query", 10, Some(&filter)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| filter.contains(&r.source_doc_id)));

        let single = vec!["b".to_string()];
        let results = retriever.search("query", 10, Some(&single)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_doc_id, "b");
    }

    #[tokio::test]
    async fn test_empty_index_is_not_an_error() {
        let embedder = Arc::new(MockEmbedder::new(8));
        let store = Arc::new(LocalVectorStore::in_memory(8).unwrap());
        let retriever = Retriever::new(embedder, store);

        let results = retriever
            .search("What is the capital of France?", 5, None)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    /// Embedder whose responses have the wrong width
    struct WrongWidthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for WrongWidthEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let vectors = texts.iter().map(|_| vec![0.5; 4]).collect::<Vec<_>>();
            crate::providers::embedding::validate_embeddings(&vectors, texts.len(), 8)?;
            Ok(vectors)
        }

        fn dimensions(&self) -> usize {
            8
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "wrong-width"
        }
    }

    #[tokio::test]
    async fn test_malformed_query_embedding_is_retrieval_outage() {
        let retriever = Retriever::new(
            Arc::new(WrongWidthEmbedder),
            Arc::new(CannedStore { hits: vec![hit("a", "a.txt", 0, 1, 0.1)] }),
        );

        let err = retriever.search("query", 5, None).await.unwrap_err();
        assert!(matches!(err, Error::RetrievalUnavailable(ref msg) if msg.contains("dimensions")));
        assert_eq!(err.kind(), crate::error::ErrorKind::RetrievalUnavailable);
    }

    #[tokio::test]
    async fn test_embedding_outage_is_distinguishable() {
        let embedder = Arc::new(MockEmbedder::new(8));
        embedder.set_available(false);
        let retriever = Retriever::new(embedder, Arc::new(CannedStore { hits: vec![] }));

        let err = retriever.search("query", 5, None).await.unwrap_err();
        assert!(matches!(err, Error::RetrievalUnavailable(_)));
    }
}
