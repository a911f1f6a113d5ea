//! Question answering endpoint

use axum::{extract::State, Json};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{QaRequest, QaResponse};

/// POST /api/qa
///
/// A dropped connection cancels answer composition.
pub async fn answer_question(
    State(state): State<AppState>,
    Json(request): Json<QaRequest>,
) -> Result<Json<QaResponse>> {
    tracing::info!("QA: \"{}\"", request.question);

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let response = state.engine().qa_with_cancel(&request, &cancel).await?;
    Ok(Json(response))
}
