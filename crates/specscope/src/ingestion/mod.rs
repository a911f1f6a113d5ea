//! Document ingestion: parsing, page splitting, section detection and chunking

mod chunker;
mod parser;
pub mod patterns;

pub use chunker::{ChunkSpan, TextChunker};
pub use parser::{FileParser, FileType, PageContent, ParsedDocument};

use uuid::Uuid;

use crate::config::SpecScopeConfig;
use crate::error::Result;
use crate::types::{Chunk, DocumentClass};

/// Everything ingestion learns about one file
#[derive(Debug, Clone)]
pub struct IngestOutput {
    pub parsed: ParsedDocument,
    pub chunks: Vec<Chunk>,
    pub class: DocumentClass,
    /// First section header in the document
    pub section: Option<String>,
    /// CSI division of the first header, if any
    pub division: Option<String>,
}

/// Parse, classify and chunk a file
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    chunker: TextChunker,
    max_pages: usize,
}

impl IngestPipeline {
    pub fn new(config: &SpecScopeConfig) -> Self {
        Self {
            chunker: TextChunker::from_config(&config.chunking),
            max_pages: config.processing.max_pages_per_upload,
        }
    }

    /// Run the pipeline for a document
    ///
    /// CPU-bound; callers on the async runtime should use `spawn_blocking`.
    pub fn run(&self, document_id: Uuid, filename: &str, data: &[u8]) -> Result<IngestOutput> {
        let parsed = FileParser::parse(filename, data, self.max_pages)?;
        let chunks = self.chunker.chunk_document(document_id, &parsed);

        let head_end = crate::types::document::floor_char_boundary(&parsed.content, 2000);
        let class = DocumentClass::detect(filename, &parsed.content[..head_end]);
        let section = chunks.iter().find_map(|c| c.section.clone());
        let division = section.as_deref().and_then(patterns::detect_division);

        tracing::info!(
            "[{}] Parsed {} pages into {} chunks (class: {})",
            filename,
            parsed.pages.len(),
            chunks.len(),
            class.display_name()
        );

        Ok(IngestOutput {
            parsed,
            chunks,
            class,
            section,
            division,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_classifies_and_chunks() {
        let pipeline = IngestPipeline::new(&SpecScopeConfig::default());
        let text = "ADDENDUM NO. 2\nSECTION 07 21 00 THERMAL INSULATION\nInsulation shall be R-30.";
        let out = pipeline.run(Uuid::new_v4(), "upload.txt", text.as_bytes()).unwrap();
        assert_eq!(out.class, DocumentClass::Addendum);
        assert_eq!(out.chunks.len(), 1);
        assert_eq!(out.section.as_deref(), Some("07 21 00"));
        assert_eq!(out.division.as_deref(), Some("07"));
    }
}
