//! specscope: hybrid retrieval, cited answers and conflict detection for construction specifications
//!
//! Documents (specifications, addenda, RFPs) are parsed, chunked with exact
//! byte offsets and indexed twice: a BM25 keyword index and a dense vector
//! index. Queries blend both, answers quote chunk text verbatim, and
//! numeric or categorical disagreements between documents are reported as
//! conflicts.

pub mod cache;
pub mod config;
pub mod conflict;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingestion;
pub mod processing;
pub mod retrieval;
pub mod scoring;
pub mod server;
pub mod store;
pub mod types;

pub use config::SpecScopeConfig;
pub use engine::{SpecScopeEngine, UploadFile};
pub use error::{Error, Result};
pub use types::{
    document::{Chunk, Document, DocumentClass, DocumentStatus},
    query::{ConflictRequest, QaRequest, SearchRequest},
    response::{Citation, Conflict, QaResponse, SearchResponse, SearchResult},
};
