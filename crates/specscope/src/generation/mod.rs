//! Extractive answer synthesis with exact-quote citations

pub mod citation;
mod synthesizer;

pub use citation::{cite, format_answer, format_sources, validate_citation};
pub use synthesizer::{sentence_spans, QaSynthesizer};
