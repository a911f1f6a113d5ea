//! Hybrid retrieval over the keyword and vector indexes

mod hybrid;
mod normalize;
mod snippet;

pub use hybrid::{blend, rank_candidates, HybridRetriever, RankedCandidate, Retrieval};
pub use normalize::Normalization;
pub use snippet::{build_snippet, find_term_spans, highlight_snippet, Snippet};
