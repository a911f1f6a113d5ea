//! Keyword and vector indexes

mod indexer;
mod keyword;
mod tokenizer;
mod vector;

pub use indexer::{IndexReport, Indexer, RetryPolicy};
pub use keyword::KeywordIndex;
pub use tokenizer::{is_stopword, tokenize, unique_terms};
pub use vector::VectorIndex;
