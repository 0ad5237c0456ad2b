//! Core data types and error definitions for the RAG pipeline.

use crate::openai::OpenAiError;
use crate::pinecone::PineconeError;
use serde::Serialize;
use thiserror::Error;

/// Maximum number of characters quoted in a source snippet.
pub const SNIPPET_MAX_CHARS: usize = 250;

/// Errors emitted by the ingestion and answering pipeline.
///
/// Each variant maps to one failure category at the HTTP boundary: validation
/// problems become 400s, everything else a 500 with a category-specific message.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Caller supplied bad or missing input.
    #[error("{0}")]
    Validation(String),
    /// The retrieval filter matched nothing for the requested document.
    #[error(
        "Document with doc_id '{doc_id}' not found. Make sure the document was uploaded correctly."
    )]
    DocumentNotFound {
        /// Identifier the caller asked about.
        doc_id: String,
    },
    /// An external call exceeded its time budget.
    #[error("Timed out communicating with Azure OpenAI. Please retry: {0}")]
    Timeout(String),
    /// The uploaded file could not be read as a PDF.
    #[error("Failed to read PDF: {0}")]
    Pdf(#[from] PdfError),
    /// Temporary file handling failed.
    #[error("Failed to stage uploaded file: {0}")]
    Io(#[from] std::io::Error),
    /// The vector index rejected a request.
    #[error("Vector index request failed: {0}")]
    Index(#[from] PineconeError),
    /// The model API rejected a request.
    #[error("Azure OpenAI request failed: {0}")]
    Model(OpenAiError),
    /// The embedding API returned no vector for the question.
    #[error("Embedding API returned no vector for the question")]
    EmptyEmbedding,
}

impl From<OpenAiError> for PipelineError {
    fn from(err: OpenAiError) -> Self {
        match err {
            // Classified at the point of failure rather than by message sniffing.
            OpenAiError::Timeout(message) => Self::Timeout(message),
            other => Self::Model(other),
        }
    }
}

/// Errors produced while extracting text from a PDF.
#[derive(Debug, Error)]
pub enum PdfError {
    /// The byte stream could not be parsed as a PDF document.
    #[error("could not parse PDF: {0}")]
    Parse(#[from] lopdf::Error),
}

/// One page of extracted document text.
#[derive(Debug, Clone)]
pub struct PageText {
    /// 1-based page number.
    pub number: u32,
    /// Raw text extracted from the page.
    pub text: String,
}

/// A bounded span of page text, the unit of embedding and retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk text.
    pub text: String,
    /// Page the chunk came from.
    pub page_number: u32,
    /// Ordinal position of the chunk within its page.
    pub chunk_index: usize,
}

/// Summary of a completed ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Identifier assigned to the ingested document.
    pub doc_id: String,
    /// Number of pages extracted from the PDF.
    pub pages: usize,
    /// Number of chunks upserted into the index.
    pub chunk_count: usize,
}

/// Citation pointing back at a retrieved chunk.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    /// Page the cited chunk came from.
    pub page_number: u32,
    /// Chunk text, truncated to [`SNIPPET_MAX_CHARS`].
    pub snippet: String,
    /// Document the chunk belongs to.
    pub doc_id: String,
}

/// Generated answer plus its citations.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Synthesized answer text.
    pub answer: String,
    /// Citations for the chunks the answer was conditioned on.
    pub sources: Vec<SourceRef>,
}

/// Truncate chunk text for citation display.
///
/// Text longer than [`SNIPPET_MAX_CHARS`] characters is cut at that boundary and
/// suffixed with an ellipsis marker; shorter text passes through unmodified.
pub fn make_snippet(text: &str) -> String {
    let mut chars = text.char_indices();
    match chars.nth(SNIPPET_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_passes_through_unmodified() {
        assert_eq!(make_snippet("short"), "short");
        let exact = "x".repeat(SNIPPET_MAX_CHARS);
        assert_eq!(make_snippet(&exact), exact);
    }

    #[test]
    fn long_text_is_cut_at_250_chars_with_marker() {
        let long = "y".repeat(SNIPPET_MAX_CHARS + 40);
        let snippet = make_snippet(&long);
        assert_eq!(snippet.len(), SNIPPET_MAX_CHARS + 3);
        assert!(snippet.ends_with("..."));
        assert_eq!(&snippet[..SNIPPET_MAX_CHARS], &long[..SNIPPET_MAX_CHARS]);
    }

    #[test]
    fn truncation_respects_multibyte_boundaries() {
        let long = "é".repeat(SNIPPET_MAX_CHARS + 1);
        let snippet = make_snippet(&long);
        assert!(snippet.ends_with("..."));
        assert_eq!(
            snippet.chars().count(),
            SNIPPET_MAX_CHARS + 3,
            "250 characters plus the marker"
        );
    }
}
