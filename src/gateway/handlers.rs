//! Request handlers for the browser-facing gateway.
//!
//! Every handler translates between the browser and the ingestion/answer
//! service without duplicating business logic: the gateway validates the bare
//! minimum (file extension, non-empty question, active session) and otherwise
//! forwards payloads verbatim. Backend failures never crash a handler; each
//! maps to a structured `{"error": "..."}` body with a category-specific
//! status: 408 for an upstream timeout, 500 with a "cannot reach" message for
//! connection failures.

use crate::gateway::GatewayState;
use crate::gateway::session::{SESSION_COOKIE, SessionData, SessionStore};
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, SignedCookieJar};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

/// Bounded wait for the backend liveness probe.
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Serve the embedded chat page.
pub(crate) async fn chat_page() -> Html<&'static str> {
    Html(include_str!("../../assets/chat.html"))
}

#[derive(Deserialize)]
struct BackendUploadBody {
    doc_id: String,
    #[serde(default)]
    message: String,
}

/// Forward a PDF upload to the backend and remember the returned `doc_id` in
/// the caller's session.
pub(crate) async fn upload(
    State(state): State<GatewayState>,
    jar: SignedCookieJar,
    mut multipart: Multipart,
) -> Response {
    // Other form fields may precede the file; skip until it appears.
    let field = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => break field,
            Ok(Some(_)) => continue,
            Ok(None) => return error_json(StatusCode::BAD_REQUEST, "No file selected"),
            Err(err) => {
                return error_json(
                    StatusCode::BAD_REQUEST,
                    &format!("Invalid upload request: {err}"),
                );
            }
        }
    };

    let filename = field.file_name().unwrap_or_default().to_string();
    if filename.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "No file selected");
    }
    if !filename.to_lowercase().ends_with(".pdf") {
        return error_json(StatusCode::BAD_REQUEST, "The file must be a PDF");
    }

    let bytes = match field.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            return error_json(
                StatusCode::BAD_REQUEST,
                &format!("Failed to read uploaded file: {err}"),
            );
        }
    };

    let part = match Part::bytes(bytes.to_vec())
        .file_name(filename.clone())
        .mime_str("application/pdf")
    {
        Ok(part) => part,
        Err(err) => {
            return error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to build upload: {err}"),
            );
        }
    };
    let form = Form::new().part("file", part);

    let response = state
        .http
        .post(format!("{}/upload-pdf", state.backend_url))
        .multipart(form)
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(err) => return upstream_failure(err),
    };

    if !response.status().is_success() {
        let detail = extract_detail(response, "Upload failed").await;
        return error_json(StatusCode::INTERNAL_SERVER_ERROR, &detail);
    }

    let body: BackendUploadBody = match response.json().await {
        Ok(body) => body,
        Err(err) => {
            return error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Unexpected backend response: {err}"),
            );
        }
    };

    // Reuse the caller's token when one exists so re-uploads replace the active
    // document instead of orphaning the old session record.
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .unwrap_or_else(SessionStore::new_token);
    state
        .sessions
        .insert(
            token.clone(),
            SessionData {
                doc_id: body.doc_id.clone(),
                filename: filename.clone(),
            },
        )
        .await;
    tracing::info!(doc_id = %body.doc_id, filename = %filename, "Document activated in session");

    let jar = jar.add(
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .build(),
    );
    (
        jar,
        Json(json!({
            "success": true,
            "doc_id": body.doc_id,
            "filename": filename,
            "message": body.message,
        })),
    )
        .into_response()
}

/// Request body for the gateway `POST /chat`.
#[derive(Deserialize)]
pub(crate) struct GatewayChatRequest {
    #[serde(default)]
    question: String,
    #[serde(default)]
    history: Option<Value>,
}

#[derive(Deserialize)]
struct BackendChatBody {
    answer: String,
    #[serde(default)]
    sources: Option<Value>,
}

/// Forward a question for the session's active document.
pub(crate) async fn chat(
    State(state): State<GatewayState>,
    jar: SignedCookieJar,
    Json(request): Json<GatewayChatRequest>,
) -> Response {
    let session = match active_session(&state, &jar).await {
        Some(session) => session,
        None => {
            return error_json(
                StatusCode::BAD_REQUEST,
                "No active document. Upload a PDF first.",
            );
        }
    };

    let question = request.question.trim();
    if question.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "The question cannot be empty");
    }

    let payload = json!({
        "doc_id": session.doc_id,
        "question": question,
        "history": request.history.unwrap_or_else(|| json!([])),
    });

    let response = state
        .http
        .post(format!("{}/chat", state.backend_url))
        .timeout(state.chat_timeout)
        .json(&payload)
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(err) => return upstream_failure(err),
    };

    if !response.status().is_success() {
        let detail = extract_detail(response, "Failed to generate an answer").await;
        return error_json(StatusCode::INTERNAL_SERVER_ERROR, &detail);
    }

    let body: BackendChatBody = match response.json().await {
        Ok(body) => body,
        Err(err) => {
            return error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Unexpected backend response: {err}"),
            );
        }
    };

    Json(json!({
        "success": true,
        "answer": body.answer,
        "sources": body.sources.unwrap_or_else(|| json!([])),
        "timestamp": clock_timestamp(),
    }))
    .into_response()
}

/// Clear the caller's session and expire the cookie.
pub(crate) async fn reset(State(state): State<GatewayState>, jar: SignedCookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value()).await;
    }
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    (
        jar,
        Json(json!({ "success": true, "message": "Session reset" })),
    )
        .into_response()
}

/// Report gateway liveness plus a best-effort probe of the backend.
///
/// A failing probe marks the backend unreachable and flips the status to 503,
/// but never errors the health endpoint itself.
pub(crate) async fn health(State(state): State<GatewayState>) -> Response {
    let probe = state
        .http
        .get(format!("{}/health", state.backend_url))
        .timeout(HEALTH_PROBE_TIMEOUT)
        .send()
        .await;
    let backend_healthy = matches!(&probe, Ok(response) if response.status().is_success());

    let body = json!({
        "frontend": "healthy",
        "backend": if backend_healthy { "healthy" } else { "unreachable" },
        "backend_url": state.backend_url,
        "timestamp": rfc3339_timestamp(),
    });

    let status = if backend_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

async fn active_session(state: &GatewayState, jar: &SignedCookieJar) -> Option<SessionData> {
    let cookie = jar.get(SESSION_COOKIE)?;
    state.sessions.get(cookie.value()).await
}

/// Map transport-level failures to distinct client-visible categories.
fn upstream_failure(err: reqwest::Error) -> Response {
    if err.is_timeout() {
        tracing::warn!(error = %err, "Backend request timed out");
        return error_json(
            StatusCode::REQUEST_TIMEOUT,
            "The request took too long. Please try again.",
        );
    }
    tracing::error!(error = %err, "Backend request failed");
    if err.is_connect() {
        error_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Cannot reach the backend service",
        )
    } else {
        error_json(StatusCode::INTERNAL_SERVER_ERROR, &format!("Error: {err}"))
    }
}

/// Pull the backend's `detail` message out of an error body, falling back to a
/// generic message when the body is not the expected envelope.
async fn extract_detail(response: reqwest::Response, fallback: &str) -> String {
    match response.json::<Value>().await {
        Ok(body) => body
            .get("detail")
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string(),
        Err(_) => fallback.to_string(),
    }
}

fn error_json(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Wall-clock time formatted for the chat transcript.
fn clock_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}

fn rfc3339_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
