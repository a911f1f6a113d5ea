//! Confidence scoring for search results and answers

mod confidence;

pub use confidence::{entailment, ConfidenceScorer, ResultSignals};
