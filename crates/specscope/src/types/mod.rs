//! Core types for the SpecScope engine

pub mod document;
pub mod query;
pub mod response;

pub use document::{sha256_hex, Chunk, Document, DocumentClass, DocumentStatus};
pub use query::{ConflictRequest, QaRequest, SearchRequest};
pub use response::{
    Citation, Conflict, ConflictKind, ConflictParticipant, ConflictResponse, DocumentListResponse,
    DocumentSummary, QaResponse, ScoreBreakdown, SearchResponse, SearchResult, Severity,
    UploadResponse, UploadStatus,
};
