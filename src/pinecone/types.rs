//! Shared types used by the Pinecone client.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned while interacting with Pinecone.
#[derive(Debug, Error)]
pub enum PineconeError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Pinecone URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Pinecone responded with an unexpected status code.
    #[error("Unexpected Pinecone response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by Pinecone.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// The index never reported ready within the polling budget.
    #[error("Index '{0}' did not become ready")]
    IndexNotReady(String),
}

/// Metadata stored alongside every vector.
///
/// `doc_id` is the isolation key: retrieval always filters on it, so chunks from
/// one document can never surface in another document's answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Identifier of the document this chunk belongs to.
    pub doc_id: String,
    /// 1-based page the chunk was extracted from.
    pub page_number: u32,
    /// Ordinal position of the chunk within its page.
    pub chunk_index: usize,
    /// Raw chunk text, kept in metadata so retrieval can quote it.
    pub text: String,
}

/// Prepared vector ready for upsert.
#[derive(Debug, Clone)]
pub struct VectorUpsert {
    /// Embedding produced for the chunk.
    pub values: Vec<f32>,
    /// Metadata persisted with the vector.
    pub metadata: ChunkMetadata,
}

/// Single match returned by a similarity query.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryMatch {
    /// Identifier assigned to the vector at upsert time.
    pub id: String,
    /// Cosine similarity score reported by Pinecone.
    #[serde(default)]
    pub score: f32,
    /// Stored chunk metadata, when requested.
    #[serde(default)]
    pub metadata: Option<ChunkMetadata>,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub(crate) matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
pub(crate) struct UpsertResponse {
    #[serde(rename = "upsertedCount", default)]
    pub(crate) upserted_count: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IndexDescription {
    #[serde(default)]
    pub(crate) host: String,
    #[serde(default)]
    pub(crate) status: IndexStatus,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct IndexStatus {
    #[serde(default)]
    pub(crate) ready: bool,
}
