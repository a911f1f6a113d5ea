//! Error types for the SpecScope engine

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
///
/// Abstention (insufficient evidence for an answer) is not represented here:
/// it is a normal `QaResponse` with `abstained = true`.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed request (empty batch, alpha out of range, top_k of zero...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown document or chunk
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Vector computation failed during ingestion
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Transient index failure, retried with backoff before surfacing
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// File parsing error
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation was cancelled before producing any result
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-found error for a document
    pub fn document_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "Document",
            id: id.to_string(),
        }
    }

    /// Create a not-found error for a chunk
    pub fn chunk_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "Chunk",
            id: id.to_string(),
        }
    }

    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an index-unavailable error
    pub fn index_unavailable(message: impl Into<String>) -> Self {
        Self::IndexUnavailable(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the Indexer/Retriever boundary should retry this error
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::IndexUnavailable(_))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            Error::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            Error::Embedding(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "embedding_error", msg.clone())
            }
            Error::IndexUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "index_unavailable", msg.clone())
            }
            Error::FileParse { filename, message } => (
                StatusCode::BAD_REQUEST,
                "parse_error",
                format!("Failed to parse '{}': {}", filename, message),
            ),
            Error::UnsupportedFileType(ext) => (
                StatusCode::BAD_REQUEST,
                "unsupported_type",
                format!("Unsupported file type: {}", ext),
            ),
            Error::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg.clone()),
            Error::Cancelled(msg) => (StatusCode::REQUEST_TIMEOUT, "cancelled", msg.clone()),
            Error::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                err.to_string(),
            ),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "json_error", err.to_string()),
            Error::Http(err) => (StatusCode::BAD_GATEWAY, "http_error", err.to_string()),
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
