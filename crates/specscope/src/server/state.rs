//! Shared state for HTTP handlers

use crate::config::SpecScopeConfig;
use crate::engine::SpecScopeEngine;
use crate::error::Result;

/// Shared application state; cloning shares the engine
#[derive(Clone)]
pub struct AppState {
    engine: SpecScopeEngine,
}

impl AppState {
    /// Build the engine from configuration
    pub async fn new(config: SpecScopeConfig) -> Result<Self> {
        tracing::info!(
            "Initializing application state (embeddings: {:?})...",
            config.embeddings.backend
        );
        let engine = SpecScopeEngine::new(config).await?;
        Ok(Self::from_engine(engine))
    }

    /// Wrap an existing engine
    pub fn from_engine(engine: SpecScopeEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &SpecScopeEngine {
        &self.engine
    }
}
