//! Hybrid search endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{SearchRequest, SearchResponse};

/// POST /api/search
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    tracing::info!(
        "Search: \"{}\" (top_k={}, alpha={})",
        request.query,
        request.top_k,
        request.alpha
    );
    let response = state.engine().search(&request).await?;
    Ok(Json(response))
}
