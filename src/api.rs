//! HTTP surface for the ingestion/answer service.
//!
//! A compact Axum router with four endpoints:
//!
//! - `GET /` – Service banner and endpoint map.
//! - `GET /health` – Liveness probe.
//! - `POST /upload-pdf` – Accept a multipart PDF, chunk and embed it, and upsert the
//!   vectors into the index. Returns the assigned `doc_id`.
//! - `POST /chat` – Answer a question against one document's chunks, returning the
//!   generated text and source citations.
//!
//! Errors use a `{"detail": "..."}` envelope. Validation problems map to 400;
//! dependency failures, missing documents, and timeouts map to 500 with
//! category-specific messages derived from the typed pipeline error.

use crate::openai::ChatMessage;
use crate::pipeline::{PipelineError, RagApi, SourceRef};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Largest accepted upload, in bytes.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the HTTP router exposing the ingestion/answer surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/upload-pdf", post(upload_pdf::<S>))
        .route("/chat", post(chat::<S>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

/// Service banner with an endpoint map for quick discovery.
async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Welcome to the RAG chatbot API",
        "endpoints": {
            "health": "/health",
            "upload": "/upload-pdf",
            "chat": "/chat"
        }
    }))
}

/// Response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "RAG chatbot API is operational",
    })
}

/// Success response for `POST /upload-pdf`.
#[derive(Serialize)]
struct UploadResponse {
    doc_id: String,
    message: String,
    filename: String,
}

/// Accept a multipart PDF upload and run it through the ingestion pipeline.
async fn upload_pdf<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: RagApi,
{
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| validation(format!("Invalid multipart request: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if field.content_type() != Some("application/pdf") {
            return Err(validation(
                "The file must be a PDF (application/pdf)".to_string(),
            ));
        }
        let filename = field.file_name().unwrap_or("document.pdf").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| validation(format!("Failed to read uploaded file: {err}")))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, bytes) =
        upload.ok_or_else(|| validation("Missing 'file' field in upload".to_string()))?;
    if bytes.is_empty() {
        return Err(validation("The PDF file is empty".to_string()));
    }

    let outcome = service.ingest_pdf(&bytes, None).await?;
    tracing::info!(
        doc_id = %outcome.doc_id,
        filename = %filename,
        pages = outcome.pages,
        chunks = outcome.chunk_count,
        "Upload request completed"
    );

    Ok(Json(UploadResponse {
        doc_id: outcome.doc_id,
        message: "PDF processed and ingested successfully".to_string(),
        filename,
    }))
}

/// Request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    /// Document to answer against.
    doc_id: String,
    /// Question text.
    question: String,
    /// Optional prior turns carried into the prompt.
    #[serde(default)]
    history: Option<Vec<ChatMessage>>,
}

/// Success response for `POST /chat`.
#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    sources: Vec<SourceRef>,
}

/// Answer a question scoped to a single document.
async fn chat<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError>
where
    S: RagApi,
{
    if request.doc_id.trim().is_empty() {
        return Err(validation("doc_id is required".to_string()));
    }
    if request.question.trim().is_empty() {
        return Err(validation("question is required".to_string()));
    }

    let history = request.history.unwrap_or_default();
    let outcome = service
        .answer(&request.doc_id, &request.question, &history)
        .await?;

    Ok(Json(ChatResponse {
        answer: outcome.answer,
        sources: outcome.sources,
    }))
}

fn validation(message: String) -> AppError {
    AppError(PipelineError::Validation(message))
}

/// Adapter translating pipeline errors into HTTP responses.
struct AppError(PipelineError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self(inner)
    }
}
