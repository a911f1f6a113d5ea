//! Conflict detection across documents
//!
//! Chunks are reduced to assertions (a subject plus a numeric or categorical
//! value) and assertions on the same subject from different documents are
//! compared.

mod detector;
mod extract;

pub use detector::{relative_difference, ConflictDetector, ScanOutcome};
pub use extract::{extract_assertions, section_key, Assertion, AssertionValue};
