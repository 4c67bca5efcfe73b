//! Local vector store: HNSW index over an embedded SQLite database
//!
//! SQLite holds chunk text, source metadata, and the embedding of every
//! chunk; `hnsw_rs` answers nearest-neighbour queries. Each chunk's SQLite
//! `point_id` is its data ID in the graph. The graph is rebuilt from SQLite
//! on open, and deleted points are masked out of queries until then.

use async_trait::async_trait;
use hnsw_rs::filter::FilterT;
use hnsw_rs::prelude::{DistCosine, Hnsw};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::config::VectorIndexConfig;
use crate::error::{Error, Result};
use crate::types::Chunk;

use super::vector_store::{DocumentFilter, VectorHit, VectorStoreProvider};

/// Layer cap for the HNSW graph
const MAX_LAYERS: usize = 16;

/// Minimum capacity hint handed to the graph
const MIN_CAPACITY: usize = 10_000;

type CosineGraph = Hnsw<'static, f32, DistCosine>;

/// HNSW vector index with SQLite persistence
#[derive(Clone)]
pub struct LocalVectorStore {
    conn: Arc<Mutex<Connection>>,
    graph: Arc<CosineGraph>,
    /// Points deleted since the graph was built
    removed: Arc<RwLock<HashSet<usize>>>,
    dimensions: usize,
    ef_search: usize,
}

impl LocalVectorStore {
    /// Create or open the index at the given path
    pub fn open<P: AsRef<Path>>(
        path: P,
        dimensions: usize,
        config: &VectorIndexConfig,
    ) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::vector_db(format!("Failed to open vector index: {}", e)))?;
        Self::with_connection(conn, dimensions, config)
    }

    /// Create an in-memory index
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::vector_db(format!("Failed to open in-memory index: {}", e)))?;
        Self::with_connection(conn, dimensions, &VectorIndexConfig::default())
    }

    fn with_connection(
        conn: Connection,
        dimensions: usize,
        config: &VectorIndexConfig,
    ) -> Result<Self> {
        migrate(&conn)?;

        let stored: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        let graph = Hnsw::new(
            config.hnsw_m,
            (stored as usize).max(MIN_CAPACITY),
            MAX_LAYERS,
            config.hnsw_ef_construction,
            DistCosine {},
        );

        let rebuilt = load_graph(&conn, &graph, dimensions)?;
        if rebuilt > 0 {
            tracing::info!("Rebuilt HNSW index from {} stored chunks", rebuilt);
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            graph: Arc::new(graph),
            removed: Arc::new(RwLock::new(HashSet::new())),
            dimensions,
            ef_search: config.hnsw_ef_search,
        })
    }

    fn check_dimensions(&self, actual: usize) -> Result<()> {
        if actual != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual,
            });
        }
        Ok(())
    }

    fn insert_blocking(&self, chunks: &[Chunk]) -> Result<()> {
        for chunk in chunks {
            self.check_dimensions(chunk.embedding.len())?;
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut replaced = Vec::new();
        let mut points = Vec::with_capacity(chunks.len());
        {
            let mut existing = tx.prepare("SELECT point_id FROM chunks WHERE id = ?1")?;
            let mut remove = tx.prepare("DELETE FROM chunks WHERE point_id = ?1")?;
            let mut insert = tx.prepare(
                "INSERT INTO chunks
                    (id, document_id, filename, chunk_index, total_chunks, text, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for chunk in chunks {
                let id = chunk.id();
                if let Some(old) = existing
                    .query_row(params![id], |row| row.get::<_, i64>(0))
                    .optional()?
                {
                    remove.execute(params![old])?;
                    replaced.push(old as usize);
                }

                insert.execute(params![
                    id,
                    chunk.document_id,
                    chunk.filename,
                    chunk.chunk_index as i64,
                    chunk.total_chunks as i64,
                    chunk.text,
                    encode_vector(&chunk.embedding),
                ])?;
                points.push(tx.last_insert_rowid() as usize);
            }
        }
        tx.commit()?;

        for (chunk, point) in chunks.iter().zip(&points) {
            self.graph.insert_slice((chunk.embedding.as_slice(), *point));
        }
        if !replaced.is_empty() {
            self.removed.write().extend(replaced);
        }

        Ok(())
    }

    fn search_blocking(
        &self,
        query: &[f32],
        top_k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<VectorHit>> {
        self.check_dimensions(query.len())?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let ef = self.ef_search.max(top_k);

        let neighbours = match filter {
            DocumentFilter::All => {
                let removed = self.removed.read();
                if removed.is_empty() {
                    self.graph.search(query, top_k, ef)
                } else {
                    let live = |point: &usize| !removed.contains(point);
                    self.graph
                        .search_filter(query, top_k, ef, Some(&live as &dyn FilterT))
                }
            }
            DocumentFilter::One(_) | DocumentFilter::AnyOf(_) => {
                let allowed = points_for(&conn, filter)?;
                if allowed.is_empty() {
                    return Ok(Vec::new());
                }
                self.graph
                    .search_filter(query, top_k, ef, Some(&allowed as &dyn FilterT))
            }
        };

        let distances: Vec<(usize, f32)> = neighbours
            .into_iter()
            .map(|n| (n.d_id, n.distance))
            .collect();
        let mut chunks = chunks_for(&conn, distances.iter().map(|(point, _)| *point))?;

        let mut hits: Vec<VectorHit> = distances
            .into_iter()
            .filter_map(|(point, distance)| {
                chunks.remove(&point).map(|chunk| VectorHit {
                    chunk,
                    distance: if distance.is_nan() { 1.0 } else { distance.clamp(0.0, 2.0) },
                })
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }

    fn delete_blocking(&self, document_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let points = points_for(&conn, &DocumentFilter::One(document_id.to_string()))?;
        let count = conn.execute("DELETE FROM chunks WHERE document_id = ?1", params![document_id])?;

        if !points.is_empty() {
            self.removed.write().extend(points);
        }
        Ok(count)
    }

    fn len_blocking(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Run a closure against a clone of this store on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(LocalVectorStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl VectorStoreProvider for LocalVectorStore {
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let chunks = chunks.to_vec();
        self.blocking(move |store| store.insert_blocking(&chunks)).await
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<VectorHit>> {
        let query = query_embedding.to_vec();
        let filter = filter.clone();
        self.blocking(move |store| store.search_blocking(&query, top_k, &filter))
            .await
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        let document_id = document_id.to_string();
        self.blocking(move |store| store.delete_blocking(&document_id))
            .await
    }

    async fn len(&self) -> Result<usize> {
        self.blocking(|store| store.len_blocking()).await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.len().await.is_ok())
    }

    fn name(&self) -> &str {
        "hnsw"
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS chunks (
            point_id INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            document_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            total_chunks INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id);
        "#,
    )
    .map_err(|e| Error::vector_db(format!("Failed to migrate vector index: {}", e)))?;

    Ok(())
}

/// Insert every stored embedding into a fresh graph
fn load_graph(conn: &Connection, graph: &CosineGraph, dimensions: usize) -> Result<usize> {
    let mut stmt = conn.prepare("SELECT point_id, embedding FROM chunks")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
    })?;

    let mut loaded = 0;
    for row in rows {
        let (point, blob) = row?;
        let vector = decode_vector(&blob);
        if vector.len() != dimensions {
            return Err(Error::DimensionMismatch {
                expected: dimensions,
                actual: vector.len(),
            });
        }
        graph.insert_slice((vector.as_slice(), point as usize));
        loaded += 1;
    }
    Ok(loaded)
}

/// Sorted point IDs of the chunks a filter admits
fn points_for(conn: &Connection, filter: &DocumentFilter) -> Result<Vec<usize>> {
    let ids: Vec<&String> = match filter {
        DocumentFilter::All => Vec::new(),
        DocumentFilter::One(id) => vec![id],
        DocumentFilter::AnyOf(ids) => ids.iter().collect(),
    };

    let sql = if ids.is_empty() {
        "SELECT point_id FROM chunks ORDER BY point_id".to_string()
    } else {
        format!(
            "SELECT point_id FROM chunks WHERE document_id IN ({}) ORDER BY point_id",
            placeholders(ids.len())
        )
    };

    let mut stmt = conn.prepare(&sql)?;
    let points = stmt
        .query_map(params_from_iter(ids), |row| row.get::<_, i64>(0))?
        .map(|point| point.map(|p| p as usize))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(points)
}

/// Chunk metadata for the given points; embeddings are left empty
fn chunks_for(
    conn: &Connection,
    points: impl Iterator<Item = usize>,
) -> Result<HashMap<usize, Chunk>> {
    let points: Vec<i64> = points.map(|p| p as i64).collect();
    if points.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT point_id, document_id, filename, chunk_index, total_chunks, text
         FROM chunks WHERE point_id IN ({})",
        placeholders(points.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(points), |row| {
        Ok((
            row.get::<_, i64>(0)? as usize,
            Chunk {
                document_id: row.get(1)?,
                filename: row.get(2)?,
                chunk_index: row.get::<_, i64>(3)? as usize,
                total_chunks: row.get::<_, i64>(4)? as usize,
                text: row.get(5)?,
                embedding: Vec::new(),
            },
        ))
    })?;

    Ok(rows.collect::<rusqlite::Result<HashMap<_, _>>>()?)
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: &str, index: usize, total: usize, embedding: Vec<f32>) -> Chunk {
        Chunk {
            document_id: doc.to_string(),
            filename: format!("{}.txt", doc),
            chunk_index: index,
            total_chunks: total,
            text: format!("{} chunk {}", doc, index),
            embedding,
        }
    }

    #[test]
    fn test_vector_blob_encoding() {
        let v = vec![0.25, -1.5, 3.0];
        assert_eq!(decode_vector(&encode_vector(&v)), v);
    }

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let store = LocalVectorStore::in_memory(2).unwrap();
        store
            .insert_chunks(&[
                chunk("a", 0, 2, vec![0.0, 1.0]),
                chunk("a", 1, 2, vec![1.0, 0.1]),
                chunk("b", 0, 1, vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 10, &DocumentFilter::All).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk.id(), "a_chunk_1");
        assert_eq!(hits[1].chunk.document_id, "b");
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(hits[0].chunk.embedding.is_empty());
        assert!((hits[2].distance - 1.0).abs() < 1e-4);

        let top1 = store.search(&[1.0, 0.0], 1, &DocumentFilter::All).await.unwrap();
        assert_eq!(top1.len(), 1);
    }

    #[tokio::test]
    async fn test_filters() {
        let store = LocalVectorStore::in_memory(2).unwrap();
        store
            .insert_chunks(&[
                chunk("a", 0, 1, vec![1.0, 0.0]),
                chunk("b", 0, 1, vec![1.0, 0.0]),
                chunk("c", 0, 1, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let one = store
            .search(&[1.0, 0.0], 10, &DocumentFilter::One("b".into()))
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].chunk.document_id, "b");

        let many = store
            .search(&[1.0, 0.0], 10, &DocumentFilter::AnyOf(vec!["a".into(), "c".into()]))
            .await
            .unwrap();
        assert_eq!(many.len(), 2);
        assert!(many.iter().all(|h| h.chunk.document_id != "b"));

        let none = store
            .search(&[1.0, 0.0], 10, &DocumentFilter::One("missing".into()))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_filtered_search_fills_top_k_behind_closer_documents() {
        let store = LocalVectorStore::in_memory(2).unwrap();

        let mut chunks: Vec<Chunk> = (0..40)
            .map(|i| chunk("near", i, 40, vec![1.0, i as f32 * 0.001]))
            .collect();
        chunks.extend((0..3).map(|i| chunk("far", i, 3, vec![-1.0, 0.5 + i as f32 * 0.1])));
        store.insert_chunks(&chunks).await.unwrap();

        let hits = store
            .search(&[1.0, 0.0], 3, &DocumentFilter::One("far".into()))
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.chunk.document_id == "far"));
    }

    #[tokio::test]
    async fn test_delete_by_document() {
        let store = LocalVectorStore::in_memory(2).unwrap();
        store
            .insert_chunks(&[
                chunk("a", 0, 2, vec![1.0, 0.0]),
                chunk("a", 1, 2, vec![0.9, 0.1]),
                chunk("b", 0, 1, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_by_document("a").await.unwrap(), 2);
        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(store.delete_by_document("a").await.unwrap(), 0);

        let hits = store.search(&[1.0, 0.0], 5, &DocumentFilter::All).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.document_id, "b");
    }

    #[tokio::test]
    async fn test_reinsert_replaces_chunk() {
        let store = LocalVectorStore::in_memory(2).unwrap();
        store.insert_chunks(&[chunk("a", 0, 1, vec![0.0, 1.0])]).await.unwrap();
        store.insert_chunks(&[chunk("a", 0, 1, vec![1.0, 0.0])]).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        let hits = store.search(&[1.0, 0.0], 5, &DocumentFilter::All).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].distance < 1e-4);
    }

    #[tokio::test]
    async fn test_index_is_rebuilt_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.db");
        let config = VectorIndexConfig::default();

        {
            let store = LocalVectorStore::open(&path, 2, &config).unwrap();
            store
                .insert_chunks(&[
                    chunk("a", 0, 1, vec![1.0, 0.0]),
                    chunk("b", 0, 1, vec![0.0, 1.0]),
                ])
                .await
                .unwrap();
            store.delete_by_document("b").await.unwrap();
        }

        let reopened = LocalVectorStore::open(&path, 2, &config).unwrap();
        let hits = reopened.search(&[0.0, 1.0], 5, &DocumentFilter::All).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.document_id, "a");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let store = LocalVectorStore::in_memory(3).unwrap();
        let err = store
            .insert_chunks(&[chunk("a", 0, 1, vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
        assert!(store.is_empty().await.unwrap());

        let err = store.search(&[1.0, 0.0], 5, &DocumentFilter::All).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
    }
}
