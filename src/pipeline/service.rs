//! Pipeline service coordinating PDF extraction, chunking, embedding, and retrieval.

use crate::{
    config::get_config,
    openai::{AzureOpenAiClient, ChatMessage},
    pinecone::{ChunkMetadata, PineconeService, QueryMatch, VectorUpsert},
    pipeline::{
        chunking::chunk_page,
        pdf::extract_pages,
        types::{ChatOutcome, Chunk, IngestOutcome, PipelineError, SourceRef, make_snippet},
    },
};
use async_trait::async_trait;
use std::io::Write;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Fixed system instruction for answer generation.
pub(crate) const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based \
     on the provided context. If you cannot find the answer in the context, please say so. Keep \
     your answers concise and accurate.";

/// Coordinates the full RAG pipeline: ingesting PDFs into the vector index and
/// answering questions against one document's chunks.
///
/// The service owns long-lived handles to the Azure OpenAI client and the
/// Pinecone transport. Construct it once near process start and share it
/// through an `Arc`.
pub struct RagService {
    openai: AzureOpenAiClient,
    pinecone: PineconeService,
}

/// Abstraction over the pipeline used by the HTTP surface.
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Split, embed, and store an uploaded PDF; returns the assigned `doc_id`.
    async fn ingest_pdf(
        &self,
        bytes: &[u8],
        doc_id: Option<String>,
    ) -> Result<IngestOutcome, PipelineError>;

    /// Answer a question against the chunks of a single document.
    async fn answer(
        &self,
        doc_id: &str,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<ChatOutcome, PipelineError>;
}

impl RagService {
    /// Build a new pipeline service from the process configuration.
    pub fn new() -> Result<Self, PipelineError> {
        tracing::info!("Initializing Azure OpenAI client");
        let openai = AzureOpenAiClient::new()?;
        tracing::info!("Initializing Pinecone client");
        let pinecone = PineconeService::new()?;
        Ok(Self { openai, pinecone })
    }

    /// Ingest a PDF byte stream: extract per-page text, chunk it, embed every
    /// chunk, and upsert the vectors tagged with `doc_id`.
    ///
    /// The bytes are staged in a temporary file that is removed when this
    /// function returns, on success and on every error path alike. Repeated
    /// uploads of the same content are stored again under a fresh `doc_id`.
    pub async fn ingest_pdf(
        &self,
        bytes: &[u8],
        doc_id: Option<String>,
    ) -> Result<IngestOutcome, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::Validation("The PDF file is empty".into()));
        }

        // One-time-per-deployment bootstrap; a cheap describe once the index exists.
        self.pinecone.ensure_index().await?;

        let doc_id = doc_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        tracing::info!(doc_id = %doc_id, size = bytes.len(), "Processing PDF");

        let mut staged = NamedTempFile::new()?;
        staged.write_all(bytes)?;
        staged.flush()?;
        let pages = extract_pages(staged.path())?;
        drop(staged);
        tracing::info!(doc_id = %doc_id, pages = pages.len(), "Loaded PDF pages");

        let config = get_config();
        let mut chunks: Vec<Chunk> = Vec::new();
        for page in &pages {
            for (chunk_index, text) in chunk_page(&page.text, config.chunk_size, config.chunk_overlap)
                .into_iter()
                .enumerate()
            {
                chunks.push(Chunk {
                    text,
                    page_number: page.number,
                    chunk_index,
                });
            }
        }

        if chunks.is_empty() {
            return Err(PipelineError::Validation(
                "The PDF contains no extractable text".into(),
            ));
        }
        tracing::debug!(doc_id = %doc_id, chunks = chunks.len(), "Split pages into chunks");

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.openai.generate_embeddings(texts).await?;
        debug_assert_eq!(chunks.len(), embeddings.len());

        let vectors: Vec<VectorUpsert> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| VectorUpsert {
                values,
                metadata: ChunkMetadata {
                    doc_id: doc_id.clone(),
                    page_number: chunk.page_number,
                    chunk_index: chunk.chunk_index,
                    text: chunk.text.clone(),
                },
            })
            .collect();

        let chunk_count = self.pinecone.upsert_chunks(vectors).await?;
        tracing::info!(doc_id = %doc_id, chunks = chunk_count, "PDF ingested");

        Ok(IngestOutcome {
            doc_id,
            pages: pages.len(),
            chunk_count,
        })
    }

    /// Retrieve the nearest chunks of `doc_id` and generate an answer from them.
    pub async fn answer(
        &self,
        doc_id: &str,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<ChatOutcome, PipelineError> {
        let doc_id = doc_id.trim();
        let question = question.trim();
        if doc_id.is_empty() {
            return Err(PipelineError::Validation("doc_id is required".into()));
        }
        if question.is_empty() {
            return Err(PipelineError::Validation("question is required".into()));
        }

        let mut vectors = self
            .openai
            .generate_embeddings(vec![question.to_string()])
            .await?;
        let vector = vectors.pop().ok_or(PipelineError::EmptyEmbedding)?;

        let config = get_config();
        let matches = self
            .pinecone
            .query(vector, doc_id, config.retrieval_top_k)
            .await?;

        let retrieved: Vec<ChunkMetadata> = matches
            .into_iter()
            .filter_map(|QueryMatch { metadata, .. }| metadata)
            .collect();
        if retrieved.is_empty() {
            return Err(PipelineError::DocumentNotFound {
                doc_id: doc_id.to_string(),
            });
        }
        tracing::debug!(doc_id, retrieved = retrieved.len(), "Retrieved context chunks");

        let context = retrieved
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let messages = build_messages(question, &context, history);
        let answer = self.openai.complete(&messages).await?;

        let sources = retrieved
            .into_iter()
            .map(|chunk| SourceRef {
                page_number: chunk.page_number,
                snippet: make_snippet(&chunk.text),
                doc_id: chunk.doc_id,
            })
            .collect();

        tracing::info!(doc_id, "Answer generated");
        Ok(ChatOutcome { answer, sources })
    }
}

/// Assemble the completion prompt: system instruction, prior turns, then the
/// retrieved context and the question as the final user message.
pub(crate) fn build_messages(
    question: &str,
    context: &str,
    history: &[ChatMessage],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(format!(
        "Context:\n{context}\n\nQuestion: {question}"
    )));
    messages
}

#[async_trait]
impl RagApi for RagService {
    async fn ingest_pdf(
        &self,
        bytes: &[u8],
        doc_id: Option<String>,
    ) -> Result<IngestOutcome, PipelineError> {
        RagService::ingest_pdf(self, bytes, doc_id).await
    }

    async fn answer(
        &self,
        doc_id: &str,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<ChatOutcome, PipelineError> {
        RagService::answer(self, doc_id, question, history).await
    }
}
