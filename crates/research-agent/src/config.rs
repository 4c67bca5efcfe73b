//! Configuration for the research agent

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable pointing at a TOML config file
pub const CONFIG_ENV_VAR: &str = "RESEARCH_AGENT_CONFIG";

/// Environment variable overriding the Ollama base URL
pub const OLLAMA_HOST_ENV_VAR: &str = "OLLAMA_HOST";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// On-disk locations
    pub storage: StorageConfig,
    /// Text chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Retrieval defaults and limits
    pub retrieval: RetrievalConfig,
    /// HNSW index parameters
    pub vector_index: VectorIndexConfig,
}

impl AgentConfig {
    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Resolve configuration: explicit path, then `RESEARCH_AGENT_CONFIG`, then defaults.
    /// `OLLAMA_HOST` always wins for the Ollama base URL.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };

        if let Ok(host) = std::env::var(OLLAMA_HOST_ENV_VAR) {
            if !host.trim().is_empty() {
                config.llm.base_url = normalize_base_url(&host);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be positive".into()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be positive".into()));
        }
        if self.vector_index.hnsw_m == 0 || self.vector_index.hnsw_ef_search == 0 {
            return Err(Error::Config(
                "vector_index.hnsw_m and hnsw_ef_search must be positive".into(),
            ));
        }
        if self.retrieval.max_top_k == 0
            || self.retrieval.default_top_k == 0
            || self.retrieval.default_top_k > self.retrieval.max_top_k
        {
            return Err(Error::Config(format!(
                "retrieval.default_top_k ({}) must be within 1..={}",
                self.retrieval.default_top_k, self.retrieval.max_top_k
            )));
        }
        Ok(())
    }
}

/// `OLLAMA_HOST` is often given without a scheme (`127.0.0.1:11434`)
fn normalize_base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Origins allowed by CORS (the Vite dev server by default)
    pub cors_origins: Vec<String>,
    /// Maximum upload size in bytes (default: 10MB)
    pub max_upload_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:5173".to_string()],
            max_upload_size: 10 * 1024 * 1024,
        }
    }
}

/// On-disk layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root data directory
    pub data_dir: PathBuf,
}

impl StorageConfig {
    /// Uploaded originals
    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join("files")
    }

    /// Extracted plain text
    pub fn text_dir(&self) -> PathBuf {
        self.data_dir.join("text")
    }

    /// Document metadata database
    pub fn documents_db(&self) -> PathBuf {
        self.data_dir.join("documents.db")
    }

    /// Vector index database
    pub fn vectors_db(&self) -> PathBuf {
        self.data_dir.join("vectors.db")
    }

    /// Chat session database
    pub fn sessions_db(&self) -> PathBuf {
        self.data_dir.join("sessions.db")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("research-agent");
        Self { data_dir }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 51, // ~10%
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama embedding model
    pub model: String,
    /// Dimensions every vector must have
    pub dimensions: usize,
    /// Texts per embed request
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "mxbai-embed-large".to_string(),
            dimensions: 1024,
            batch_size: 32,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Chat model used when neither the request nor a selection names one
    pub default_model: String,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Timeout for non-streaming calls (embeddings, model listing)
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "llama3.2".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 120,
        }
    }
}

/// Retrieval defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks retrieved when the caller does not say
    pub default_top_k: usize,
    /// Upper bound accepted from callers
    pub max_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 20,
        }
    }
}

/// HNSW index parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorIndexConfig {
    /// Max connections per node
    pub hnsw_m: usize,
    /// Candidate list size while building
    pub hnsw_ef_construction: usize,
    /// Candidate list size while searching; raised to `top_k` when smaller
    pub hnsw_ef_search: usize,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            hnsw_m: 32,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 100,
        }
    }
}
