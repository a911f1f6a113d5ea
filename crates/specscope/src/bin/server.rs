//! SpecScope server binary
//!
//! Run with: cargo run -p specscope --bin specscope-server
//! Set SPECSCOPE_CONFIG to load a TOML config file.

use specscope::{config::EmbeddingBackend, server::SpecScopeServer, SpecScopeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "specscope=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SpecScopeConfig::from_env()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding backend: {:?}", config.embeddings.backend);
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - Chunk size: {}", config.chunking.chunk_size);
    tracing::info!("  - Normalization: {:?}", config.retrieval.normalization);
    if config.storage.persist {
        tracing::info!("  - Snapshot: {}", config.storage.snapshot_path.display());
    }

    if config.embeddings.backend == EmbeddingBackend::Ollama {
        tracing::info!("Checking Ollama at {}...", config.embeddings.ollama_url);
        let client = reqwest::Client::new();
        match client
            .get(format!("{}/api/tags", config.embeddings.ollama_url))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => tracing::info!("Ollama is running"),
            _ => {
                tracing::warn!("Ollama not available at {}", config.embeddings.ollama_url);
                tracing::warn!(
                    "Vector search stays unavailable until `ollama pull {}` is served",
                    config.embeddings.model
                );
            }
        }
    }

    let server = SpecScopeServer::new(config).await?;

    println!("\nSpecScope starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/upload     - Upload documents");
    println!("  POST /api/search     - Hybrid search");
    println!("  POST /api/qa         - Ask questions");
    println!("  POST /api/conflicts  - Detect conflicts");
    println!("  GET  /api/documents  - List documents");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
