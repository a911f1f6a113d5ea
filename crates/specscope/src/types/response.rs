//! Response types for search, QA, conflicts and uploads

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Chunk, Document, DocumentClass, DocumentStatus};

/// Per-component scores, all in [0, 1]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    /// Normalized vector similarity
    pub vector: f32,
    /// Normalized BM25 score
    pub keyword: f32,
    /// `alpha * vector + (1 - alpha) * keyword`
    pub hybrid: f32,
}

/// A ranked chunk returned by hybrid search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub document_id: Uuid,
    pub filename: String,
    pub page_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub scores: ScoreBreakdown,
    /// Calibrated confidence (0.0-1.0)
    pub confidence: f32,
    /// Window of chunk text around the first highlight
    pub snippet: String,
    /// Query terms found in the snippet
    pub highlights: Vec<String>,
    /// Byte ranges of highlights inside `snippet`
    pub highlight_spans: Vec<(usize, usize)>,
    /// Full chunk text
    pub text: String,
}

impl SearchResult {
    /// Create a result for a chunk with empty snippet data
    pub fn from_chunk(chunk: &Chunk, filename: impl Into<String>, scores: ScoreBreakdown) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            document_id: chunk.document_id,
            filename: filename.into(),
            page_number: chunk.page_number,
            section: chunk.section.clone(),
            scores,
            confidence: 0.0,
            snippet: String::new(),
            highlights: Vec::new(),
            highlight_spans: Vec::new(),
            text: chunk.text.clone(),
        }
    }
}

/// Response from a search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total_results: usize,
    /// True when the query could not be embedded and results are keyword-only
    #[serde(default)]
    pub degraded: bool,
    pub processing_time_ms: u64,
}

/// An exact quote from a chunk backing part of an answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub chunk_id: String,
    pub document_id: Uuid,
    pub filename: String,
    pub page_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Exact text of `chunk.text[char_start..char_end]`
    pub quote: String,
    /// Byte offset relative to the chunk text
    pub char_start: usize,
    /// Byte offset relative to the chunk text (exclusive)
    pub char_end: usize,
}

impl Citation {
    /// Format citation for display in text
    pub fn format_inline(&self) -> String {
        match &self.section {
            Some(section) => format!(
                "[Source: {}, Page {}, {}]",
                self.filename, self.page_number, section
            ),
            None => format!("[Source: {}, Page {}]", self.filename, self.page_number),
        }
    }
}

/// Answer to a question, grounded in citations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    /// Overall confidence (0.0-1.0)
    pub confidence: f32,
    /// Search results that were actually cited
    pub used_chunks: Vec<SearchResult>,
    /// True when the engine declined to answer
    pub abstained: bool,
    /// True when cut short by cancellation or timeout
    pub partial: bool,
    /// True when evidence was gathered by keyword search alone
    #[serde(default)]
    pub degraded: bool,
    pub processing_time_ms: u64,
}

impl QaResponse {
    /// Fixed abstention text
    pub const ABSTAIN_ANSWER: &'static str =
        "Insufficient evidence in the provided documents to answer this question.";

    /// Abstention: no evidence, zero confidence
    pub fn abstain() -> Self {
        Self {
            answer: Self::ABSTAIN_ANSWER.to_string(),
            citations: Vec::new(),
            confidence: 0.0,
            used_chunks: Vec::new(),
            abstained: true,
            partial: false,
            degraded: false,
            processing_time_ms: 0,
        }
    }

    /// Mark as cut short
    pub fn into_partial(mut self) -> Self {
        self.partial = true;
        self
    }

    pub fn with_degraded(mut self, degraded: bool) -> Self {
        self.degraded = degraded;
        self
    }
}

/// How two or more chunks disagree
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    NumericMismatch,
    CategoricalContradiction,
    WordingDivergence,
}

/// Conflict severity, ordered `Low < Medium < High`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One side of a conflict
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictParticipant {
    pub document_id: Uuid,
    pub filename: String,
    pub chunk_id: String,
    pub page_number: u32,
    /// Sentence carrying the assertion
    pub text: String,
    /// Extracted value, e.g. "90 min" or "prohibited"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A disagreement between documents on one subject
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conflict {
    pub kind: ConflictKind,
    /// Normalized subject key
    pub subject: String,
    pub description: String,
    pub severity: Severity,
    pub participants: Vec<ConflictParticipant>,
}

impl Conflict {
    /// Distinct documents among participants
    pub fn document_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::new();
        for p in &self.participants {
            if !ids.contains(&p.document_id) {
                ids.push(p.document_id);
            }
        }
        ids
    }
}

/// Response from conflict detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResponse {
    pub conflicts: Vec<Conflict>,
    pub chunks_examined: usize,
    /// True when a scan was cut short
    pub partial: bool,
    pub processing_time_ms: u64,
}

/// Summary of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub filename: String,
    pub class: DocumentClass,
    pub status: DocumentStatus,
    pub total_pages: u32,
    pub total_chunks: u32,
    pub file_size: u64,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            class: doc.class,
            status: doc.status,
            total_pages: doc.total_pages,
            total_chunks: doc.total_chunks,
            file_size: doc.file_size,
            uploaded_at: doc.uploaded_at,
            error_message: doc.error_message.clone(),
        }
    }
}

/// Response for listing documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentSummary>,
    pub total_count: usize,
}

/// Outcome of one uploaded file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadStatus {
    /// Accepted; ingestion continues in the background
    Accepted { document: DocumentSummary, job_id: Uuid },
    /// Same content already uploaded
    Duplicate {
        existing_document_id: Uuid,
        existing_filename: String,
        filename: String,
    },
    /// Rejected before ingestion started
    Rejected { filename: String, error: String },
}

impl UploadStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Response from an upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub files: Vec<UploadStatus>,
    pub accepted: usize,
    pub rejected: usize,
}

impl UploadResponse {
    pub fn new(files: Vec<UploadStatus>) -> Self {
        let accepted = files.iter().filter(|f| f.is_accepted()).count();
        let rejected = files
            .iter()
            .filter(|f| matches!(f, UploadStatus::Rejected { .. }))
            .count();
        Self {
            files,
            accepted,
            rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
    }

    #[test]
    fn test_abstain_shape() {
        let r = QaResponse::abstain();
        assert!(r.abstained);
        assert!(r.citations.is_empty());
        assert_eq!(r.confidence, 0.0);
        assert_eq!(
            r.answer,
            "Insufficient evidence in the provided documents to answer this question."
        );
    }

    #[test]
    fn test_upload_status_serializes_tagged() {
        let status = UploadStatus::Rejected {
            filename: "a.exe".to_string(),
            error: "Unsupported file type: exe".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["filename"], "a.exe");
    }
}
