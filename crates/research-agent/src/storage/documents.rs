//! Document metadata and on-disk file layout
//!
//! Originals live at `files/{id}{ext}`, extracted text at `text/{id}.txt`,
//! metadata in a `documents` table.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::ingestion::validator;
use crate::types::{Document, ExtractionStatus, FileType};

use super::{format_timestamp, parse_timestamp, run_blocking};

/// Bytes kept from the start of an upload for the signature check
const SIGNATURE_BYTES: usize = 1024;

/// A validated upload written to disk but not yet registered
#[derive(Debug)]
pub struct StagedUpload {
    pub path: PathBuf,
    pub size: u64,
}

/// Document store: files on disk plus a SQLite registry
#[derive(Clone)]
pub struct DocumentStore {
    files_dir: PathBuf,
    text_dir: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl DocumentStore {
    /// Open the store under the configured data directory
    pub fn open(config: &StorageConfig) -> Result<Self> {
        std::fs::create_dir_all(config.files_dir())?;
        std::fs::create_dir_all(config.text_dir())?;

        let conn = Connection::open(config.documents_db())
            .map_err(|e| Error::database(format!("Failed to open document database: {}", e)))?;

        Self::with_connection(config.files_dir(), config.text_dir(), conn)
    }

    fn with_connection(files_dir: PathBuf, text_dir: PathBuf, conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                size INTEGER NOT NULL,
                upload_date TEXT NOT NULL,
                file_path TEXT NOT NULL,
                text_path TEXT NOT NULL,
                extraction_status TEXT NOT NULL,
                chunk_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_documents_upload_date ON documents(upload_date);
            "#,
        )
        .map_err(|e| Error::database(format!("Failed to migrate document database: {}", e)))?;

        Ok(Self {
            files_dir,
            text_dir,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Where the original of a document is stored
    pub fn file_path(&self, id: &str, file_type: FileType) -> PathBuf {
        self.files_dir.join(format!("{}{}", id, file_type.extension()))
    }

    /// Where the extracted text of a document is stored
    pub fn text_path(&self, id: &str) -> PathBuf {
        self.text_dir.join(format!("{}.txt", id))
    }

    /// Stream an upload to disk, enforcing the size limit as bytes arrive
    /// and checking the file signature against `file_type` once complete.
    ///
    /// On any failure the partially written file is removed.
    pub async fn stage_upload<S>(
        &self,
        id: &str,
        filename: &str,
        file_type: FileType,
        body: S,
        max_bytes: u64,
    ) -> Result<StagedUpload>
    where
        S: Stream<Item = Result<Bytes>>,
    {
        let path = self.file_path(id, file_type);

        match write_checked(&path, filename, file_type, body, max_bytes).await {
            Ok(size) => Ok(StagedUpload { path, size }),
            Err(e) => {
                remove_if_exists(&path).await;
                Err(e)
            }
        }
    }

    /// Write extracted text next to the original
    pub async fn save_text(&self, id: &str, text: &str) -> Result<PathBuf> {
        let path = self.text_path(id);
        tokio::fs::write(&path, text).await?;
        Ok(path)
    }

    /// Remove a document's files; missing files are not an error
    pub async fn discard_files(&self, file_path: &Path, text_path: &Path) {
        remove_if_exists(file_path).await;
        remove_if_exists(text_path).await;
    }

    /// Record a fully ingested document
    pub async fn register(&self, doc: &Document) -> Result<()> {
        let conn = self.conn.clone();
        let doc = doc.clone();
        run_blocking(move || {
            conn.lock().execute(
                "INSERT INTO documents
                    (id, filename, size, upload_date, file_path, text_path, extraction_status, chunk_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    doc.id,
                    doc.filename,
                    doc.size as i64,
                    format_timestamp(&doc.upload_date),
                    doc.file_path.to_string_lossy(),
                    doc.text_path.to_string_lossy(),
                    doc.extraction_status.as_str(),
                    doc.chunk_count as i64,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// All documents, newest first
    pub async fn list(&self) -> Result<Vec<Document>> {
        let conn = self.conn.clone();
        run_blocking(move || {
            let conn = conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id, filename, size, upload_date, file_path, text_path, extraction_status, chunk_count
                 FROM documents ORDER BY upload_date DESC",
            )?;

            let documents = stmt
                .query_map([], row_to_document)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(documents)
        })
        .await
    }

    /// Get a document by ID
    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.conn.clone();
        let id = id.to_string();
        run_blocking(move || {
            let doc = conn
                .lock()
                .query_row(
                    "SELECT id, filename, size, upload_date, file_path, text_path, extraction_status, chunk_count
                     FROM documents WHERE id = ?1",
                    params![id],
                    row_to_document,
                )
                .optional()?;
            Ok(doc)
        })
        .await
    }

    /// Delete a document record and its files, returning what was removed
    pub async fn delete(&self, id: &str) -> Result<Option<Document>> {
        let Some(doc) = self.get(id).await? else {
            return Ok(None);
        };

        let conn = self.conn.clone();
        let doc_id = doc.id.clone();
        run_blocking(move || {
            conn.lock()
                .execute("DELETE FROM documents WHERE id = ?1", params![doc_id])?;
            Ok(())
        })
        .await?;

        self.discard_files(&doc.file_path, &doc.text_path).await;
        Ok(Some(doc))
    }
}

async fn write_checked<S>(
    path: &Path,
    filename: &str,
    file_type: FileType,
    body: S,
    max_bytes: u64,
) -> Result<u64>
where
    S: Stream<Item = Result<Bytes>>,
{
    futures::pin_mut!(body);

    let mut file = tokio::fs::File::create(path).await?;
    let mut size = 0u64;
    let mut head: Vec<u8> = Vec::with_capacity(SIGNATURE_BYTES);

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        size += chunk.len() as u64;
        validator::check_size(size, max_bytes)?;

        if head.len() < SIGNATURE_BYTES {
            let take = (SIGNATURE_BYTES - head.len()).min(chunk.len());
            head.extend_from_slice(&chunk[..take]);
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    validator::validate_content(file_type, filename, &head)?;
    Ok(size)
}

async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        filename: row.get(1)?,
        size: row.get::<_, i64>(2)? as u64,
        upload_date: parse_timestamp(&row.get::<_, String>(3)?)?,
        file_path: PathBuf::from(row.get::<_, String>(4)?),
        text_path: PathBuf::from(row.get::<_, String>(5)?),
        extraction_status: ExtractionStatus::parse(&row.get::<_, String>(6)?),
        chunk_count: row.get::<_, i64>(7)? as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use futures::stream;

    fn store() -> (tempfile::TempDir, DocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            data_dir: dir.path().to_path_buf(),
        };
        let store = DocumentStore::open(&config).unwrap();
        (dir, store)
    }

    fn body(parts: Vec<&'static [u8]>) -> impl Stream<Item = Result<Bytes>> {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p))))
    }

    fn document(store: &DocumentStore, id: &str, minutes_ago: i64) -> Document {
        Document {
            id: id.to_string(),
            filename: format!("{}.txt", id),
            size: 5,
            upload_date: Utc::now() - Duration::minutes(minutes_ago),
            file_path: store.file_path(id, FileType::Txt),
            text_path: store.text_path(id),
            extraction_status: ExtractionStatus::Success,
            chunk_count: 1,
        }
    }

    #[tokio::test]
    async fn test_stage_upload_writes_file() {
        let (_dir, store) = store();
        let staged = store
            .stage_upload("d1", "a.md", FileType::Markdown, body(vec![&b"# Ti"[..], &b"tle\n"[..]]), 1024)
            .await
            .unwrap();

        assert_eq!(staged.size, 8);
        assert_eq!(tokio::fs::read(&staged.path).await.unwrap(), b"# Title\n");
        assert!(staged.path.ends_with("files/d1.md"));
    }

    #[tokio::test]
    async fn test_oversized_upload_is_removed() {
        let (_dir, store) = store();
        let err = store
            .stage_upload("d1", "a.txt", FileType::Txt, body(vec![&b"12345"[..], &b"67890"[..]]), 8)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FileTooLarge { max_bytes: 8 }));
        assert!(!store.file_path("d1", FileType::Txt).exists());
    }

    #[tokio::test]
    async fn test_bad_signature_is_removed() {
        let (_dir, store) = store();
        let err = store
            .stage_upload("d1", "fake.pdf", FileType::Pdf, body(vec![&b"\xff\xd8\xff\xe0\x00"[..]]), 1024)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidFileContent(_)));
        assert!(!store.file_path("d1", FileType::Pdf).exists());
    }

    #[tokio::test]
    async fn test_text_upload_with_pdf_header_is_removed() {
        let (_dir, store) = store();
        let err = store
            .stage_upload("d1", "notes.txt", FileType::Txt, body(vec![&b"%PDF-1.4\n\xff\x00"[..]]), 1024)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidFileContent(name) if name == "notes.txt"));
        assert!(!store.file_path("d1", FileType::Txt).exists());
    }

    #[tokio::test]
    async fn test_register_list_delete() {
        let (_dir, store) = store();

        for (id, age) in [("old", 10), ("new", 1)] {
            let doc = document(&store, id, age);
            tokio::fs::write(&doc.file_path, b"hello").await.unwrap();
            store.save_text(id, "hello").await.unwrap();
            store.register(&doc).await.unwrap();
        }

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["new", "old"]);

        let removed = store.delete("old").await.unwrap().unwrap();
        assert!(!removed.file_path.exists());
        assert!(!removed.text_path.exists());
        assert!(store.get("old").await.unwrap().is_none());
        assert!(store.delete("old").await.unwrap().is_none());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
