//! Conflict detection endpoint

use axum::{extract::State, Json};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{ConflictRequest, ConflictResponse};

/// POST /api/conflicts
///
/// With a query, compares the retrieved chunks; without one, scans the
/// corpus. A scan stops when the client disconnects.
pub async fn detect_conflicts(
    State(state): State<AppState>,
    Json(request): Json<ConflictRequest>,
) -> Result<Json<ConflictResponse>> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let response = state
        .engine()
        .conflicts_with_cancel(&request, &cancel)
        .await?;
    Ok(Json(response))
}
