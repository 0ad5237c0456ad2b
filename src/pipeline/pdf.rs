//! Per-page PDF text extraction backed by `lopdf`.

use crate::pipeline::types::{PageText, PdfError};
use lopdf::Document;
use std::path::Path;

/// Load a PDF from disk and extract its text one page at a time.
///
/// Pages are returned in document order with 1-based numbering. A page whose
/// text cannot be decoded is skipped with a warning rather than failing the
/// whole document; images-only pages simply yield empty text.
pub fn extract_pages(path: &Path) -> Result<Vec<PageText>, PdfError> {
    let doc = Document::load(path)?;
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    let mut pages = Vec::with_capacity(page_numbers.len());

    for number in page_numbers {
        match doc.extract_text(&[number]) {
            Ok(text) => pages.push(PageText { number, text }),
            Err(err) => {
                tracing::warn!(page = number, error = %err, "Skipping unreadable page");
            }
        }
    }

    tracing::debug!(pages = pages.len(), "Extracted PDF text");
    Ok(pages)
}
