//! Text extraction for uploaded documents (PDF, DOCX, plain text).
//!
//! Each format yields an ordered sequence of text blocks: one per page for
//! PDF, one per paragraph for DOCX, blank-line-separated paragraphs for
//! plain text. Blocks with no non-whitespace content are dropped. The caller
//! is responsible for rejecting unsupported extensions before calling in.

use std::io::Read;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction error. Never panics; the request handler maps this to a 4xx/5xx.
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedExtension(String),
    Pdf(String),
    Docx(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedExtension(ext) => {
                write!(f, "unsupported extension: {}", ext)
            }
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Docx(e) => write!(f, "DOCX extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extracts ordered text blocks from raw file bytes, dispatching on the
/// declared extension (lowercase, without the dot).
pub fn extract_blocks(bytes: &[u8], ext: &str) -> Result<Vec<String>, ExtractError> {
    match ext {
        "pdf" => extract_pdf(bytes),
        "docx" => extract_docx(bytes),
        "txt" => Ok(extract_txt(bytes)),
        other => Err(ExtractError::UnsupportedExtension(other.to_string())),
    }
}

/// One block per page; pages with no visible text are dropped.
fn extract_pdf(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(pages
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect())
}

/// One block per `w:p` paragraph in `word/document.xml`; empty paragraphs dropped.
fn extract_docx(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|e| ExtractError::Docx(e.to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| ExtractError::Docx(e.to_string()))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(ExtractError::Docx(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }
    extract_paragraphs(&doc_xml)
}

/// Walks the document XML collecting `w:t` runs grouped by enclosing `w:p`.
fn extract_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"p" {
                    current.clear();
                } else if name.as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        current.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" {
                    let text = current.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                    current.clear();
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

/// Lossy UTF-8 decode, split on blank lines. Falls back to the whole text as
/// a single block when no blank-line boundaries exist; empty input yields an
/// empty sequence. Decoding itself is never fatal.
fn extract_txt(bytes: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(bytes);
    let parts: Vec<String> = text
        .split("\n\n")
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect();
    if !parts.is_empty() {
        parts
    } else if text.trim().is_empty() {
        Vec::new()
    } else {
        vec![text.into_owned()]
    }
}
