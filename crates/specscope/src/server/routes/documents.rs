//! Document listing endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::processing::JobProgress;
use crate::server::state::AppState;
use crate::types::{Chunk, Document, DocumentListResponse, DocumentSummary};

/// A document with its chunks and latest ingestion job
#[derive(Debug, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: Document,
    pub chunks: Vec<Chunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<JobProgress>,
}

/// GET /api/documents
pub async fn list_documents(State(state): State<AppState>) -> Json<DocumentListResponse> {
    let documents: Vec<DocumentSummary> = state
        .engine()
        .documents()
        .iter()
        .map(DocumentSummary::from)
        .collect();
    Json(DocumentListResponse {
        total_count: documents.len(),
        documents,
    })
}

/// GET /api/documents/:id
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentDetail>> {
    let engine = state.engine();
    let document = engine.document(&id)?;
    let chunks = engine.chunks(&id)?;
    Ok(Json(DocumentDetail {
        document,
        chunks,
        job: engine.job_for_document(&id),
    }))
}
