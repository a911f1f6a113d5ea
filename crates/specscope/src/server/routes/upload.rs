//! Document upload endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::engine::UploadFile;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::UploadResponse;

/// POST /api/upload - Register files and queue them for ingestion
///
/// Every multipart field carrying a file name is treated as a file.
pub async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::validation(format!("Failed to read '{}': {}", filename, e)))?;

        tracing::debug!("Received file: {} ({} bytes)", filename, data.len());
        files.push(UploadFile::new(filename, data.to_vec()));
    }

    let response = state.engine().upload(files).await?;
    Ok(Json(response))
}
