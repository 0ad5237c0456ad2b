//! RAG pipeline: PDF extraction, chunking, embedding, retrieval, and answer generation.

pub mod chunking;
pub mod pdf;
mod service;
pub mod types;

pub use service::{RagApi, RagService};
pub use types::{
    ChatOutcome, IngestOutcome, PageText, PdfError, PipelineError, SourceRef, make_snippet,
};
