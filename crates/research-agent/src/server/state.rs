//! Application state for the research agent server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::chat::ChatService;
use crate::config::AgentConfig;
use crate::error::Result;
use crate::generation::{ModelSelection, RagPipeline};
use crate::ingestion::{IngestPipeline, TextChunker};
use crate::providers::{
    ChatCompletionProvider, EmbeddingProvider, OllamaChat, OllamaClient, OllamaEmbedder,
    LocalVectorStore, VectorStoreProvider,
};
use crate::retrieval::Retriever;
use crate::storage::{DocumentStore, SessionStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: AgentConfig,
    /// Uploaded files and their metadata
    documents: DocumentStore,
    /// Chat history
    sessions: SessionStore,
    /// Chunk, embed, and index uploads
    ingest: IngestPipeline,
    /// Retrieval plus streamed completion
    rag: RagPipeline,
    /// Turn driver over `rag` and `sessions`
    chat: ChatService,
    /// Which chat model serves requests
    models: ModelSelection,
    /// Completion backend, also used for model listing
    llm: Arc<dyn ChatCompletionProvider>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create application state backed by Ollama and the local HNSW index
    pub async fn new(config: AgentConfig) -> Result<Self> {
        tracing::info!("Initializing research agent state...");

        let ollama = Arc::new(OllamaClient::new(&config.llm)?);
        tracing::info!(
            "Ollama client initialized at {} (embeddings: {})",
            ollama.base_url(),
            config.embeddings.model
        );

        std::fs::create_dir_all(&config.storage.data_dir)?;
        let vector_store = Arc::new(LocalVectorStore::open(
            config.storage.vectors_db(),
            config.embeddings.dimensions,
            &config.vector_index,
        )?);
        tracing::info!(
            "HNSW vector index ready ({} chunks indexed)",
            vector_store.len().await?
        );

        let embedder = Arc::new(OllamaEmbedder::new(ollama.clone(), &config.embeddings));
        let llm = Arc::new(OllamaChat::new(ollama));

        Self::with_providers(config, embedder, llm, vector_store)
    }

    /// Create application state over explicit providers
    pub fn with_providers(
        config: AgentConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn ChatCompletionProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let documents = DocumentStore::open(&config.storage)?;
        let sessions = SessionStore::open(config.storage.sessions_db())?;
        tracing::info!("Storage opened at {}", config.storage.data_dir.display());

        let ingest = IngestPipeline::new(
            TextChunker::from_config(&config.chunking),
            embedder.clone(),
            vector_store.clone(),
        );
        let rag = RagPipeline::new(Retriever::new(embedder, vector_store), llm.clone());
        let chat = ChatService::new(rag.clone(), sessions.clone());
        let models = ModelSelection::new(config.llm.default_model.clone());

        tracing::info!(
            "Providers: llm={}, default model {}",
            llm.name(),
            config.llm.default_model
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                documents,
                sessions,
                ingest,
                rag,
                chat,
                models,
                llm,
                ready: RwLock::new(true),
            }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.inner.documents
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    pub fn ingest(&self) -> &IngestPipeline {
        &self.inner.ingest
    }

    pub fn retriever(&self) -> &Retriever {
        self.inner.rag.retriever()
    }

    pub fn chat(&self) -> &ChatService {
        &self.inner.chat
    }

    pub fn models(&self) -> &ModelSelection {
        &self.inner.models
    }

    pub fn llm(&self) -> &Arc<dyn ChatCompletionProvider> {
        &self.inner.llm
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
