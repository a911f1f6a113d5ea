//! Deterministic text chunking with page and offset tracking

use rayon::prelude::*;
use uuid::Uuid;

use super::parser::ParsedDocument;
use super::patterns::{detect_section_header, detect_topics};
use crate::config::ChunkingConfig;
use crate::types::document::{ceil_char_boundary, floor_char_boundary};
use crate::types::Chunk;

/// A chunk span inside a single page, in page-local byte offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
}

/// Text chunker with configurable size and overlap
///
/// Chunk boundaries depend only on the text, so re-ingesting the same file
/// yields the same spans (and therefore the same chunk IDs).
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Target chunk size in bytes
    chunk_size: usize,
    /// Overlap between consecutive chunks
    overlap: usize,
    /// Minimum distance from the chunk start for a newline snap
    newline_min_offset: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
            newline_min_offset: 50,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        let mut chunker = Self::new(config.chunk_size, config.chunk_overlap);
        chunker.newline_min_offset = config.newline_min_offset;
        chunker
    }

    /// Split a page into spans
    ///
    /// Each span ends at the last newline before the size limit when that
    /// newline is far enough from the start; the next span starts `overlap`
    /// bytes before the previous end but always makes progress.
    pub fn spans(&self, text: &str) -> Vec<ChunkSpan> {
        let n = text.len();
        let mut spans = Vec::new();
        let mut start = 0;

        while start < n {
            let mut end = floor_char_boundary(text, start + self.chunk_size);
            if end <= start {
                end = ceil_char_boundary(text, start + 1);
            }

            if end < n {
                if let Some(pos) = text[start..end].rfind('\n') {
                    let newline = start + pos;
                    if newline > start + self.newline_min_offset {
                        end = newline;
                    }
                }
            }

            spans.push(ChunkSpan { start, end });
            if end >= n {
                break;
            }

            let next = end.saturating_sub(self.overlap).max(start + 1);
            start = ceil_char_boundary(text, next);
        }

        spans
    }

    /// Chunk every page of a parsed document
    ///
    /// Pages are chunked in parallel; a page without its own header inherits the
    /// previous page's section.
    pub fn chunk_document(&self, document_id: Uuid, parsed: &ParsedDocument) -> Vec<Chunk> {
        let per_page: Vec<(Option<String>, Vec<ChunkSpan>)> = parsed
            .pages
            .par_iter()
            .map(|page| {
                let text = parsed.page_text(page);
                (detect_section_header(text), self.spans(text))
            })
            .collect();

        let mut chunks = Vec::new();
        let mut section: Option<String> = None;
        let mut chunk_index = 0u32;

        for (page, (header, spans)) in parsed.pages.iter().zip(per_page) {
            if header.is_some() {
                section = header;
            }
            let page_text = parsed.page_text(page);

            for span in spans {
                let text = &page_text[span.start..span.end];
                if text.trim().is_empty() {
                    continue;
                }
                let chunk = Chunk::new(
                    document_id,
                    text,
                    page.page_number,
                    page.char_offset + span.start,
                    page.char_offset + span.end,
                    chunk_index,
                )
                .with_section(section.clone())
                .with_topics(detect_topics(text));
                chunks.push(chunk);
                chunk_index += 1;
            }
        }

        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::parser::FileParser;
    use proptest::prelude::*;

    #[test]
    fn test_short_text_single_span() {
        let chunker = TextChunker::new(100, 20);
        assert_eq!(chunker.spans("hello"), vec![ChunkSpan { start: 0, end: 5 }]);
        assert!(chunker.spans("").is_empty());
    }

    #[test]
    fn test_overlap_and_progress() {
        let chunker = TextChunker::new(10, 3);
        let text = "abcdefghijklmnopqrstuvwxyz";
        let spans = chunker.spans(text);
        assert_eq!(spans[0], ChunkSpan { start: 0, end: 10 });
        assert_eq!(spans[1], ChunkSpan { start: 7, end: 17 });
        assert_eq!(spans.last().map(|s| s.end), Some(text.len()));
    }

    #[test]
    fn test_newline_snap() {
        let chunker = TextChunker::new(100, 10);
        let first = "x".repeat(70);
        let text = format!("{}\n{}", first, "y".repeat(80));
        let spans = chunker.spans(&text);
        assert_eq!(spans[0].end, 70);
    }

    #[test]
    fn test_newline_too_close_to_start_is_ignored() {
        let chunker = TextChunker::new(100, 10);
        let text = format!("ab\n{}", "z".repeat(200));
        assert_eq!(chunker.spans(&text)[0].end, 100);
    }

    #[test]
    fn test_chunk_document_offsets_and_sections() {
        let data = "DIVISION 08 - OPENINGS\nDoors shall have a fire rating of 90 minutes.\x0cHardware shall be stainless steel.";
        let parsed = FileParser::parse("spec.txt", data.as_bytes(), 100).unwrap();
        let doc_id = Uuid::new_v4();
        let chunks = TextChunker::default().chunk_document(doc_id, &parsed);

        assert_eq!(chunks.len(), 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(&parsed.content[chunk.char_start..chunk.char_end], chunk.text);
            assert_eq!(chunk.chunk_index, i as u32);
            assert_eq!(chunk.section.as_deref(), Some("DIVISION 08"));
        }
        assert_eq!(chunks[1].page_number, 2);
    }

    #[test]
    fn test_rechunking_is_deterministic() {
        let parsed = FileParser::parse("a.txt", "line one\nline two".repeat(200).as_bytes(), 10).unwrap();
        let id = Uuid::new_v4();
        let chunker = TextChunker::new(300, 50);
        let a: Vec<String> = chunker.chunk_document(id, &parsed).into_iter().map(|c| c.id).collect();
        let b: Vec<String> = chunker.chunk_document(id, &parsed).into_iter().map(|c| c.id).collect();
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_spans_cover_text_on_char_boundaries(
            text in "[a-zé—\n ]{0,400}",
            size in 5usize..80,
            overlap in 0usize..40,
        ) {
            let chunker = TextChunker::new(size, overlap);
            let spans = chunker.spans(&text);
            let mut prev_start = None;
            for span in &spans {
                prop_assert!(span.start < span.end);
                prop_assert!(text.is_char_boundary(span.start));
                prop_assert!(text.is_char_boundary(span.end));
                if let Some(p) = prev_start {
                    prop_assert!(span.start > p);
                }
                prev_start = Some(span.start);
            }
            if !text.is_empty() {
                prop_assert_eq!(spans[0].start, 0);
                prop_assert_eq!(spans.last().map(|s| s.end), Some(text.len()));
            }
        }
    }
}
