//! API routes

pub mod conflicts;
pub mod documents;
pub mod jobs;
pub mod qa;
pub mod search;
pub mod upload;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};

use crate::engine::EngineStats;
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(upload::upload_files).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/search", post(search::search))
        .route("/qa", post(qa::answer_question))
        .route("/documents", get(documents::list_documents))
        .route("/documents/:id", get(documents::get_document))
        .route("/conflicts", post(conflicts::detect_conflicts))
        .route("/jobs/:id", get(jobs::get_job))
        .route("/stats", get(stats))
        .route("/info", get(info))
}

/// GET /api/stats
async fn stats(State(state): State<AppState>) -> Json<EngineStats> {
    Json(state.engine().stats())
}

/// API info endpoint
async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "specscope",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Hybrid retrieval, cited QA and conflict detection over specification documents",
        "endpoints": {
            "POST /api/upload": "Upload documents for background ingestion",
            "POST /api/search": "Hybrid keyword + vector search",
            "POST /api/qa": "Extractive answer with exact-quote citations",
            "GET /api/documents": "List documents",
            "GET /api/documents/:id": "Document details with chunks",
            "POST /api/conflicts": "Cross-document conflict detection",
            "GET /api/jobs/:id": "Ingestion job progress",
            "GET /api/stats": "Corpus and cache statistics"
        }
    }))
}
