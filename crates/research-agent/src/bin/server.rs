//! Research agent server binary
//!
//! Run with: cargo run -p research-agent --bin research-agent-server -- --config agent.toml

use clap::Parser;
use research_agent::{config::AgentConfig, providers::OllamaClient, server::RagServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "research-agent-server", version, about = "Chat with your documents")]
struct Args {
    /// TOML configuration file (falls back to RESEARCH_AGENT_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "research_agent=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = AgentConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Data directory: {}", config.storage.data_dir.display());
    tracing::info!("  - Embedding model: {} ({} dims)", config.embeddings.model, config.embeddings.dimensions);
    tracing::info!("  - Chat model: {}", config.llm.default_model);
    tracing::info!("  - Chunk size: {} (overlap {})", config.chunking.chunk_size, config.chunking.chunk_overlap);

    // Startup continues without Ollama; requests report it as unavailable
    tracing::info!("Checking Ollama at {}...", config.llm.base_url);
    let status = OllamaClient::new(&config.llm)?.status().await;
    if status.error.is_none() {
        tracing::info!("Ollama is running ({} models installed)", status.models.len());
    } else {
        tracing::warn!("Ollama not available at {}", config.llm.base_url);
        tracing::warn!("  Start it with: ollama serve");
        tracing::warn!(
            "  Pull models: ollama pull {} && ollama pull {}",
            config.embeddings.model,
            config.llm.default_model
        );
    }

    let server = RagServer::new(config).await?;
    tracing::info!("Health: http://{}/health", server.address());

    server.start().await?;

    Ok(())
}
