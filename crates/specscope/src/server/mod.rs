//! HTTP server

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SpecScopeConfig;
use crate::engine::SpecScopeEngine;
use crate::error::{Error, Result};
use state::AppState;

/// SpecScope HTTP server
pub struct SpecScopeServer {
    config: SpecScopeConfig,
    state: AppState,
}

impl SpecScopeServer {
    pub async fn new(config: SpecScopeConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Serve an existing engine
    pub fn with_engine(engine: SpecScopeEngine) -> Self {
        Self {
            config: engine.config().clone(),
            state: AppState::from_engine(engine),
        }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness))
            .nest("/api", routes::api_routes(self.config.server.max_upload_size))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new());

        if self.config.server.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }
        router
    }

    /// Bind and serve until the process stops
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();
        tracing::info!("Starting SpecScope server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let embeddings = match state.engine().health_check().await {
        Ok(true) => "ok",
        Ok(false) => "degraded",
        Err(e) => {
            tracing::warn!("Embedding backend health check failed: {}", e);
            "unavailable"
        }
    };
    let stats = state.engine().stats();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "embeddings": embeddings,
            "documents": stats.documents,
            "chunks": stats.chunks,
        })),
    )
}

/// Readiness: the embedding backend must answer before queries can be served
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.engine().health_check().await {
        Ok(true) => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}
