//! Citation construction and validation

use crate::types::{Chunk, Citation};

/// Citation for `chunk.text[start..end]`
///
/// Returns `None` when the range is not a valid slice of the chunk text.
pub fn cite(chunk: &Chunk, filename: &str, start: usize, end: usize) -> Option<Citation> {
    let quote = chunk.text.get(start..end)?;
    if quote.is_empty() {
        return None;
    }
    Some(Citation {
        chunk_id: chunk.id.clone(),
        document_id: chunk.document_id,
        filename: filename.to_string(),
        page_number: chunk.page_number,
        section: chunk.section.clone(),
        quote: quote.to_string(),
        char_start: start,
        char_end: end,
    })
}

/// Whether `citation` quotes `chunk` exactly at its recorded offsets
pub fn validate_citation(citation: &Citation, chunk: &Chunk) -> bool {
    citation.chunk_id == chunk.id
        && citation.document_id == chunk.document_id
        && citation.char_start < citation.char_end
        && chunk.text.get(citation.char_start..citation.char_end) == Some(citation.quote.as_str())
}

/// Answer text with numbered citation markers after each clause
pub fn format_answer(clauses: &[(String, usize)]) -> String {
    clauses
        .iter()
        .map(|(clause, n)| format!("{} [{}]", clause, n))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Numbered source list, one `format_inline` line per citation
pub fn format_sources(citations: &[Citation]) -> String {
    citations
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{}] {}", i + 1, c.format_inline()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chunk() -> Chunk {
        let text = "Part 1. Doors shall be rated 90 minutes. End.";
        Chunk::new(Uuid::new_v4(), text, 4, 100, 100 + text.len(), 0)
    }

    #[test]
    fn test_cite_and_validate() {
        let chunk = chunk();
        let start = chunk.text.find("Doors").unwrap();
        let end = chunk.text.find(" End").unwrap();
        let citation = cite(&chunk, "spec.pdf", start, end).unwrap();
        assert_eq!(citation.quote, "Doors shall be rated 90 minutes.");
        assert_eq!(citation.page_number, 4);
        assert!(validate_citation(&citation, &chunk));
    }

    #[test]
    fn test_tampered_quote_fails_validation() {
        let chunk = chunk();
        let mut citation = cite(&chunk, "spec.pdf", 8, 13).unwrap();
        citation.quote = "Walls".to_string();
        assert!(!validate_citation(&citation, &chunk));
        assert!(cite(&chunk, "spec.pdf", 8, 8).is_none());
        assert!(cite(&chunk, "spec.pdf", 8, 10_000).is_none());
    }

    #[test]
    fn test_formatting() {
        let chunk = chunk();
        let citation = cite(&chunk, "spec.pdf", 8, 13).unwrap();
        assert_eq!(
            format_answer(&[("Doors are rated.".to_string(), 1)]),
            "Doors are rated. [1]"
        );
        assert_eq!(format_sources(&[citation]), "[1] [Source: spec.pdf, Page 4]");
    }
}
