#![deny(missing_docs)]

//! Core library for the ragchat PDF question-answering system.

/// HTTP routing and REST handlers for the ingestion/answer service.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Browser-facing gateway: sessions and request translation.
pub mod gateway;
/// Structured logging and tracing setup.
pub mod logging;
/// Azure OpenAI embeddings and chat-completions client.
pub mod openai;
/// Pinecone vector index integration.
pub mod pinecone;
/// RAG pipeline: extraction, chunking, embedding, retrieval, generation.
pub mod pipeline;
