//! Keyword tokenizer shared by the BM25 index, embeddings and answer synthesis

use once_cell::sync::Lazy;
use std::collections::HashSet;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "did", "do",
        "does", "for", "from", "had", "has", "have", "how", "if", "in", "into", "is", "it",
        "its", "of", "on", "or", "per", "so", "such", "than", "that", "the", "their", "then",
        "there", "these", "they", "this", "those", "to", "was", "were", "what", "when",
        "where", "which", "who", "why", "will", "with", "within",
    ]
    .into_iter()
    .collect()
});

/// Whether `token` (already lowercased) is a stopword
pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Lowercased alphanumeric runs, stopwords removed, length >= 2
///
/// A `.` between two digits stays inside the token, so "2.5" is one token.
pub fn tokenize(text: &str) -> Vec<String> {
    raw_tokens(text)
        .into_iter()
        .filter(|t| t.len() >= 2 && !is_stopword(t))
        .collect()
}

/// Like `tokenize`, but deduplicated in first-seen order
pub fn unique_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn raw_tokens(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
            continue;
        }
        let decimal_point = c == '.'
            && current.chars().last().is_some_and(|p| p.is_ascii_digit())
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        if decimal_point {
            current.push('.');
            continue;
        }
        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
