//! Snippet windows and query-term highlights

use regex::RegexBuilder;

use crate::index::unique_terms;
use crate::types::document::{ceil_char_boundary, floor_char_boundary};

/// Snippet text plus highlight data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snippet {
    pub text: String,
    /// Query terms present in the chunk, in query order
    pub highlights: Vec<String>,
    /// Byte ranges of highlight matches inside `text`
    pub spans: Vec<(usize, usize)>,
}

/// Byte ranges of whole-word, case-insensitive matches of `terms` in `text`
pub fn find_term_spans(text: &str, terms: &[String]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    for term in terms {
        let pattern = format!(r"\b{}\b", regex::escape(term));
        let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(true).build() else {
            continue;
        };
        spans.extend(re.find_iter(text).map(|m| (m.start(), m.end())));
    }
    spans.sort_unstable();
    spans.dedup();
    spans
}

/// Build a `window`-byte snippet centred on the earliest query-term match
///
/// Without a match the snippet is the head of the text.
pub fn build_snippet(text: &str, query: &str, window: usize) -> Snippet {
    let terms = unique_terms(query);
    let all_spans = find_term_spans(text, &terms);

    let highlights: Vec<String> = terms
        .into_iter()
        .filter(|t| !find_term_spans(text, std::slice::from_ref(t)).is_empty())
        .collect();

    let (start, end) = match all_spans.first() {
        Some(&(first, _)) => {
            let start = floor_char_boundary(text, first.saturating_sub(window / 2));
            let end = ceil_char_boundary(text, (first + window / 2).min(text.len()));
            (start, end)
        }
        None => (0, floor_char_boundary(text, window)),
    };

    let raw = &text[start..end];
    let lead = raw.len() - raw.trim_start().len();
    let snippet = raw.trim();
    let offset = start + lead;

    let spans = all_spans
        .into_iter()
        .filter(|&(s, e)| s >= offset && e <= offset + snippet.len())
        .map(|(s, e)| (s - offset, e - offset))
        .collect();

    Snippet {
        text: snippet.to_string(),
        highlights,
        spans,
    }
}

/// Wrap highlight spans in `<mark>` tags
pub fn highlight_snippet(snippet: &Snippet) -> String {
    let mut out = String::with_capacity(snippet.text.len() + snippet.spans.len() * 13);
    let mut last = 0;
    for &(s, e) in &snippet.spans {
        if s < last {
            continue;
        }
        out.push_str(&snippet.text[last..s]);
        out.push_str("<mark>");
        out.push_str(&snippet.text[s..e]);
        out.push_str("</mark>");
        last = e;
    }
    out.push_str(&snippet.text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_point_at_terms() {
        let text = "General notes. The Fire rating of rated doors is 90 minutes; fire dampers too.";
        let snippet = build_snippet(text, "fire rating", 200);
        assert_eq!(snippet.highlights, vec!["fire", "rating"]);
        for &(s, e) in &snippet.spans {
            let word = snippet.text[s..e].to_lowercase();
            assert!(word == "fire" || word == "rating");
        }
        assert_eq!(snippet.spans.len(), 3);
    }

    #[test]
    fn test_window_centres_on_match() {
        let text = format!("{} fire rating {}", "x ".repeat(300), "y ".repeat(300));
        let snippet = build_snippet(&text, "rating", 40);
        assert!(snippet.text.contains("rating"));
        assert!(snippet.text.len() <= 40);
    }

    #[test]
    fn test_no_match_uses_head() {
        let snippet = build_snippet("Concrete shall cure seven days.", "asphalt", 8);
        assert_eq!(snippet.text, "Concrete");
        assert!(snippet.highlights.is_empty());
        assert!(snippet.spans.is_empty());
    }

    #[test]
    fn test_highlight_markup() {
        let snippet = build_snippet("Door fire rating", "fire", 100);
        assert_eq!(highlight_snippet(&snippet), "Door <mark>fire</mark> rating");
    }
}
