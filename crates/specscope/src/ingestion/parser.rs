//! File parsing into page-addressable text

use crate::error::{Error, Result};
use crate::types::sha256_hex;

/// Form feed separating pages in extracted PDF text
const PAGE_BREAK: char = '\u{000C}';

/// Separator placed between pages in the joined document text
const PAGE_SEPARATOR: &str = "\n\n";

/// Supported file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Txt,
    Markdown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::Txt),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Detect file type from a filename
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        Self::from_extension(ext)
    }
}

/// A page inside `ParsedDocument::content`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageContent {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Byte offset of the page in the full text
    pub char_offset: usize,
    /// Byte length of the page text
    pub len: usize,
}

/// Parsed document with extracted text
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub file_type: FileType,
    /// Full extracted text; pages joined by a blank line
    pub content: String,
    /// SHA-256 of the raw file bytes
    pub content_hash: String,
    pub pages: Vec<PageContent>,
    /// Pages in the source file, including any beyond the page limit
    pub total_pages: u32,
}

impl ParsedDocument {
    /// Build from per-page texts, keeping at most `max_pages`
    fn from_pages(
        file_type: FileType,
        raw: &[u8],
        page_texts: Vec<String>,
        max_pages: usize,
    ) -> Self {
        let total_pages = page_texts.len() as u32;
        let mut content = String::new();
        let mut pages = Vec::with_capacity(page_texts.len().min(max_pages));

        for (i, text) in page_texts.into_iter().take(max_pages).enumerate() {
            if i > 0 {
                content.push_str(PAGE_SEPARATOR);
            }
            pages.push(PageContent {
                page_number: i as u32 + 1,
                char_offset: content.len(),
                len: text.len(),
            });
            content.push_str(&text);
        }

        Self {
            file_type,
            content,
            content_hash: sha256_hex(raw),
            pages,
            total_pages,
        }
    }

    /// Text of one page
    pub fn page_text(&self, page: &PageContent) -> &str {
        &self.content[page.char_offset..page.char_offset + page.len]
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// File parser for PDF, plain text and markdown
pub struct FileParser;

impl FileParser {
    /// Parse a file based on its extension
    pub fn parse(filename: &str, data: &[u8], max_pages: usize) -> Result<ParsedDocument> {
        let file_type = FileType::from_filename(filename).ok_or_else(|| {
            let ext = filename.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
            Error::UnsupportedFileType(format!("'{}' (expected pdf, txt or md)", ext))
        })?;

        let parsed = match file_type {
            FileType::Pdf => Self::parse_pdf(filename, data, max_pages)?,
            FileType::Txt | FileType::Markdown => Self::parse_text(file_type, data, max_pages),
        };

        if parsed.is_empty() {
            return Err(Error::file_parse(filename, "No text content could be extracted"));
        }

        if parsed.total_pages as usize > max_pages {
            tracing::warn!(
                "[{}] {} pages exceeds limit, keeping first {}",
                filename,
                parsed.total_pages,
                max_pages
            );
        }

        Ok(parsed)
    }

    #[cfg(feature = "pdf")]
    fn parse_pdf(filename: &str, data: &[u8], max_pages: usize) -> Result<ParsedDocument> {
        let raw_text = Self::extract_pdf_with_timeout(filename, data)?;
        let pages = split_pages(&raw_text)
            .into_iter()
            .map(|p| cleanup_pdf_text(&p))
            .collect();
        Ok(ParsedDocument::from_pages(FileType::Pdf, data, pages, max_pages))
    }

    #[cfg(not(feature = "pdf"))]
    fn parse_pdf(filename: &str, _data: &[u8], _max_pages: usize) -> Result<ParsedDocument> {
        Err(Error::file_parse(
            filename,
            "PDF support not compiled in (enable the `pdf` feature)",
        ))
    }

    /// Extract PDF text on a separate thread so problematic fonts cannot hang ingestion
    #[cfg(feature = "pdf")]
    fn extract_pdf_with_timeout(filename: &str, data: &[u8]) -> Result<String> {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&data_vec);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(Duration::from_secs(60)) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(Error::file_parse(filename, e.to_string())),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::error!("[{}] PDF extraction timeout after 60s", filename);
                Err(Error::file_parse(filename, "PDF extraction timed out"))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(Error::file_parse(filename, "PDF extraction thread crashed"))
            }
        }
    }

    fn parse_text(file_type: FileType, data: &[u8], max_pages: usize) -> ParsedDocument {
        let text = String::from_utf8_lossy(data).replace('\r', "");
        let pages = split_pages(&text);
        ParsedDocument::from_pages(file_type, data, pages, max_pages)
    }
}

/// Split on form feeds; a trailing empty page is dropped
fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();
    while pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// Normalize ligatures and special spaces, strip NULs and trailing whitespace
#[cfg(feature = "pdf")]
fn cleanup_pdf_text(text: &str) -> String {
    let text = text
        .replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl");

    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim_matches('\n').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_pages_split_on_form_feed() {
        let data = b"Page one text.\x0cPage two text.\x0c";
        let parsed = FileParser::parse("spec.txt", data, 3000).unwrap();
        assert_eq!(parsed.pages.len(), 2);
        assert_eq!(parsed.total_pages, 2);
        assert_eq!(parsed.page_text(&parsed.pages[0]), "Page one text.");
        assert_eq!(parsed.page_text(&parsed.pages[1]), "Page two text.");
        assert_eq!(parsed.pages[1].page_number, 2);
    }

    #[test]
    fn test_page_limit() {
        let data = b"a\x0cb\x0cc";
        let parsed = FileParser::parse("notes.md", data, 2).unwrap();
        assert_eq!(parsed.pages.len(), 2);
        assert_eq!(parsed.total_pages, 3);
        assert!(!parsed.content.contains('c'));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = FileParser::parse("drawing.dwg", b"xx", 10).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(_)));
        assert!(FileParser::parse("noext", b"xx", 10).is_err());
    }

    #[test]
    fn test_empty_text_rejected() {
        let err = FileParser::parse("blank.txt", b"  \n ", 10).unwrap_err();
        assert!(matches!(err, Error::FileParse { .. }));
    }

    #[test]
    fn test_hash_is_of_raw_bytes() {
        let a = FileParser::parse("a.txt", b"same", 10).unwrap();
        let b = FileParser::parse("b.md", b"same", 10).unwrap();
        assert_eq!(a.content_hash, b.content_hash);
    }
}
