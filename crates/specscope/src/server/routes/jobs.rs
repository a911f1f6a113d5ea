//! Ingestion job endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::processing::JobProgress;
use crate::server::state::AppState;

/// Job progress with a completion percentage
#[derive(Debug, Serialize)]
pub struct JobResponse {
    #[serde(flatten)]
    pub progress: JobProgress,
    pub percent_complete: f32,
}

/// GET /api/jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>> {
    let progress = state.engine().job(&id)?;
    Ok(Json(JobResponse {
        percent_complete: progress.percent_complete(),
        progress,
    }))
}
