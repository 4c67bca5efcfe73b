//! Document and chunk types with source tracking for citations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Supported upload types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
}

impl FileType {
    /// Extensions accepted at the upload boundary
    pub const ALLOWED_EXTENSIONS: [&'static str; 3] = [".pdf", ".txt", ".md"];

    /// Detect file type from an extension, with or without the leading dot
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Txt),
            "md" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Detect file type from a filename
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Canonical extension including the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Txt => ".txt",
            Self::Markdown => ".md",
        }
    }
}

/// Outcome of text extraction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Pending,
    Success,
    Failed,
}

impl ExtractionStatus {
    /// Stable storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parse a stored name; unknown values read as `Failed`
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "success" => Self::Success,
            _ => Self::Failed,
        }
    }

    /// Empty extracted text is a failed extraction, never an exception
    pub fn from_extracted(text: &str) -> Self {
        if text.is_empty() {
            Self::Failed
        } else {
            Self::Success
        }
    }
}

/// An uploaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Opaque unique ID
    pub id: String,
    /// Original filename as uploaded by user
    pub filename: String,
    /// File size in bytes
    pub size: u64,
    /// Upload timestamp
    pub upload_date: DateTime<Utc>,
    /// Stored original
    pub file_path: PathBuf,
    /// Stored extracted text
    pub text_path: PathBuf,
    /// Extraction outcome
    pub extraction_status: ExtractionStatus,
    /// Chunks indexed for this document
    pub chunk_count: usize,
}

impl Document {
    /// Fresh opaque document identifier
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// A chunk of document text, addressed by (document id, ordinal)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Parent document ID
    pub document_id: String,
    /// Parent document's original filename
    pub filename: String,
    /// 0-based ordinal within the document
    pub chunk_index: usize,
    /// Number of chunks the document was split into
    pub total_chunks: usize,
    /// Text content
    pub text: String,
    /// Embedding vector
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Build the chunks of one document from split text and matching embeddings
    pub fn for_document(
        document_id: &str,
        filename: &str,
        texts: Vec<String>,
        embeddings: Vec<Vec<f32>>,
    ) -> Vec<Chunk> {
        let total_chunks = texts.len();
        texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (text, embedding))| Chunk {
                document_id: document_id.to_string(),
                filename: filename.to_string(),
                chunk_index,
                total_chunks,
                text,
                embedding,
            })
            .collect()
    }

    /// Index key
    pub fn id(&self) -> String {
        format!("{}_chunk_{}", self.document_id, self.chunk_index)
    }

    /// Human-readable position, e.g. "3/15"
    pub fn position(&self) -> String {
        chunk_position(self.chunk_index, self.total_chunks)
    }
}

/// Render the i-th (0-indexed) of n chunks as "{i+1}/{n}"
pub fn chunk_position(index: usize, total: usize) -> String {
    format!("{}/{}", index + 1, total)
}
