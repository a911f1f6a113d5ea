//! Document and chunk types with page/section tracking for citations

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::ingestion::patterns::ADDENDA_REGEX;

/// Closed set of document classes
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentClass {
    /// Project manual / technical specification
    Specification,
    /// Addendum modifying earlier documents
    Addendum,
    /// Request for proposal
    Rfp,
    /// Drawing set
    Drawings,
    /// Anything else
    #[default]
    Other,
}

impl DocumentClass {
    /// Classify from filename first, then from the opening text
    pub fn detect(filename: &str, head: &str) -> Self {
        let name = filename.to_lowercase();
        if name.contains("addend") {
            return Self::Addendum;
        }
        if name.contains("rfp") || name.contains("request for proposal") {
            return Self::Rfp;
        }
        if name.contains("drawing") || name.contains("dwg") || name.contains("sheet") {
            return Self::Drawings;
        }
        if name.contains("spec") || name.contains("manual") {
            return Self::Specification;
        }

        let head = &head[..floor_char_boundary(head, 2000)];
        if ADDENDA_REGEX.is_match(head) {
            Self::Addendum
        } else if head.to_lowercase().contains("request for proposal") {
            Self::Rfp
        } else if head.contains("DIVISION") || head.contains("SECTION") {
            Self::Specification
        } else {
            Self::Other
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Specification => "Specification",
            Self::Addendum => "Addendum",
            Self::Rfp => "RFP",
            Self::Drawings => "Drawings",
            Self::Other => "Other",
        }
    }
}

/// Ingestion lifecycle of a document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Accepted, waiting for a worker
    Uploading,
    /// Being parsed, chunked and indexed
    Processing,
    /// Fully indexed (keyword and vector)
    Completed,
    /// Ingestion failed; see `error_message`
    Failed,
}

impl DocumentStatus {
    /// Completed and Failed cannot be left
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        match (self, next) {
            (a, b) if *a == b => !a.is_terminal(),
            (Uploading, Processing) | (Uploading, Failed) => true,
            (Processing, Completed) | (Processing, Failed) => true,
            _ => false,
        }
    }
}

/// An uploaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Original filename as uploaded
    pub filename: String,
    /// File size in bytes
    pub file_size: u64,
    /// Upload timestamp
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
    /// Number of extracted pages
    pub total_pages: u32,
    /// Document class
    pub class: DocumentClass,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
    /// First detected section header
    #[serde(default)]
    pub section: Option<String>,
    /// SHA-256 of the raw bytes, used for deduplication
    pub content_hash: String,
    pub status: DocumentStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    pub total_chunks: u32,
    /// False when only keyword search covers this document
    #[serde(default)]
    pub vector_indexed: bool,
}

impl Document {
    /// Create a new document in the `Uploading` state
    pub fn new(filename: impl Into<String>, content_hash: impl Into<String>, file_size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            file_size,
            uploaded_at: chrono::Utc::now(),
            total_pages: 0,
            class: DocumentClass::Other,
            project: None,
            division: None,
            section: None,
            content_hash: content_hash.into(),
            status: DocumentStatus::Uploading,
            error_message: None,
            total_chunks: 0,
            vector_indexed: false,
        }
    }

    /// Set the project label
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Whether chunks of this document may appear in search results
    ///
    /// Failed documents stay searchable when their keyword postings landed.
    pub fn is_searchable(&self) -> bool {
        match self.status {
            DocumentStatus::Completed => true,
            DocumentStatus::Failed => self.total_chunks > 0,
            _ => false,
        }
    }
}

/// A chunk of text from a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Deterministic chunk ID (hex SHA-256)
    pub id: String,
    /// Parent document ID
    pub document_id: Uuid,
    /// Chunk text, an exact slice of the document's extracted text
    pub text: String,
    /// 1-based page number
    pub page_number: u32,
    /// Section header detected on the page
    #[serde(default)]
    pub section: Option<String>,
    /// Byte offset into the extracted text (inclusive)
    pub char_start: usize,
    /// Byte offset into the extracted text (exclusive)
    pub char_end: usize,
    /// Position within the document
    pub chunk_index: u32,
    /// SHA-256 of `text`; the embedding cache key
    pub hash: String,
    /// Construction topics matched in the text (bonds, insurance...)
    #[serde(default)]
    pub topics: Vec<String>,
}

impl Chunk {
    /// Build a chunk and derive its ID from document, page, offsets and text hash
    pub fn new(
        document_id: Uuid,
        text: impl Into<String>,
        page_number: u32,
        char_start: usize,
        char_end: usize,
        chunk_index: u32,
    ) -> Self {
        let text = text.into();
        let hash = sha256_hex(text.as_bytes());
        let id = Self::derive_id(&document_id, page_number, char_start, char_end, &hash);
        Self {
            id,
            document_id,
            text,
            page_number,
            section: None,
            char_start,
            char_end,
            chunk_index,
            hash,
            topics: Vec::new(),
        }
    }

    /// Deterministic chunk ID
    pub fn derive_id(
        document_id: &Uuid,
        page_number: u32,
        char_start: usize,
        char_end: usize,
        text_hash: &str,
    ) -> String {
        let key = format!(
            "{}:{}:{}:{}:{}",
            document_id, page_number, char_start, char_end, text_hash
        );
        sha256_hex(key.as_bytes())
    }

    /// Set the section header
    pub fn with_section(mut self, section: Option<String>) -> Self {
        self.section = section;
        self
    }

    /// Set matched topics
    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }
}

/// Hex-encoded SHA-256
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Largest char boundary `<= index`
pub(crate) fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest char boundary `>= index`
pub(crate) fn ceil_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_is_deterministic() {
        let doc = Uuid::new_v4();
        let a = Chunk::new(doc, "Door fire rating 90 minutes.", 3, 10, 38, 0);
        let b = Chunk::new(doc, "Door fire rating 90 minutes.", 3, 10, 38, 0);
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 64);

        let c = Chunk::new(doc, "Door fire rating 90 minutes.", 4, 10, 38, 0);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_status_transitions() {
        use DocumentStatus::*;
        assert!(Uploading.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Completed));
        assert!(!Uploading.can_transition_to(Completed));
    }

    #[test]
    fn test_class_detection() {
        assert_eq!(DocumentClass::detect("Addendum_02.pdf", ""), DocumentClass::Addendum);
        assert_eq!(DocumentClass::detect("project-rfp.pdf", ""), DocumentClass::Rfp);
        assert_eq!(
            DocumentClass::detect("upload.pdf", "ADDENDUM NO. 1\nRevisions to..."),
            DocumentClass::Addendum
        );
        assert_eq!(
            DocumentClass::detect("book.pdf", "DIVISION 08 - OPENINGS"),
            DocumentClass::Specification
        );
        assert_eq!(DocumentClass::detect("notes.txt", "hello"), DocumentClass::Other);
    }

    #[test]
    fn test_char_boundaries() {
        let s = "a—b";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(ceil_char_boundary(s, 2), 4);
        assert_eq!(floor_char_boundary(s, 99), s.len());
    }
}
