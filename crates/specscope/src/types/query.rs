//! Request types for search, QA and conflict detection

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Hybrid search request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query
    pub query: String,

    /// Number of results to return (default: 10)
    #[serde(default = "default_search_top_k")]
    pub top_k: usize,

    /// Blend weight: 0.0 = keyword only, 1.0 = vector only (default: 0.5)
    #[serde(default = "default_alpha")]
    pub alpha: f32,

    /// Restrict to these documents (optional)
    #[serde(default)]
    pub document_filter: Option<Vec<Uuid>>,
}

fn default_search_top_k() -> usize {
    10
}

fn default_alpha() -> f32 {
    0.5
}

fn default_qa_top_k() -> usize {
    12
}

fn default_conflict_top_k() -> usize {
    50
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            top_k: default_search_top_k(),
            alpha: default_alpha(),
            document_filter: None,
        }
    }
}

impl SearchRequest {
    /// Create a new search request
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set the number of results
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// Set the vector/keyword blend
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Filter by document IDs
    pub fn with_documents(mut self, doc_ids: Vec<Uuid>) -> Self {
        self.document_filter = Some(doc_ids);
        self
    }

    /// Reject out-of-range parameters
    pub fn validate(&self) -> Result<()> {
        validate_top_k(self.top_k)?;
        validate_alpha(self.alpha)
    }
}

/// Question answering request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaRequest {
    /// The question to answer
    pub question: String,

    /// Number of chunks to retrieve as evidence (default: 12)
    #[serde(default = "default_qa_top_k")]
    pub top_k: usize,

    /// Restrict to these documents (optional)
    #[serde(default)]
    pub document_filter: Option<Vec<Uuid>>,
}

impl QaRequest {
    /// Create a new QA request
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: default_qa_top_k(),
            document_filter: None,
        }
    }

    /// Set the number of evidence chunks
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_top_k(self.top_k)
    }
}

/// Conflict detection request
///
/// With a query, conflicts are detected among the top search results;
/// without one, among every stored chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictRequest {
    #[serde(default)]
    pub query: Option<String>,

    /// Candidate chunks considered when a query is given (default: 50)
    #[serde(default = "default_conflict_top_k")]
    pub top_k: usize,

    /// Restrict to these documents (optional)
    #[serde(default)]
    pub document_filter: Option<Vec<Uuid>>,
}

impl ConflictRequest {
    /// Conflicts among results for `query`
    pub fn for_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            top_k: default_conflict_top_k(),
            document_filter: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_top_k(self.top_k)
    }
}

pub(crate) fn validate_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(Error::validation("top_k must be at least 1"));
    }
    Ok(())
}

pub(crate) fn validate_alpha(alpha: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(Error::validation(format!(
            "alpha must be in [0, 1], got {}",
            alpha
        )));
    }
    Ok(())
}
