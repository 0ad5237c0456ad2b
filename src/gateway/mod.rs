//! Browser-facing gateway: session management and request translation.
//!
//! The gateway sits between an end-user browser and the ingestion/answer
//! service. It keeps exactly one piece of state per user — the active document
//! — behind a signed session cookie, and forwards upload and question payloads
//! upstream. No RAG logic lives here.

mod handlers;
pub mod session;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use session::SessionStore;
use std::time::Duration;

/// Largest accepted upload, in bytes.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Bounded wait on the backend chat call.
const CHAT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state for all gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub(crate) http: reqwest::Client,
    pub(crate) backend_url: String,
    pub(crate) sessions: SessionStore,
    pub(crate) key: Key,
    pub(crate) chat_timeout: Duration,
}

impl GatewayState {
    /// Build gateway state for the given backend, deriving the cookie-signing
    /// key from `secret` when it is long enough and generating an ephemeral one
    /// otherwise.
    pub fn new(backend_url: impl Into<String>, secret: Option<&str>) -> Self {
        let key = match secret {
            Some(secret) if secret.len() >= 64 => Key::from(secret.as_bytes()),
            Some(_) => {
                tracing::warn!(
                    "SECRET_KEY must be at least 64 bytes; using an ephemeral signing key"
                );
                Key::generate()
            }
            None => Key::generate(),
        };

        Self {
            http: reqwest::Client::new(),
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
            sessions: SessionStore::new(),
            key,
            chat_timeout: CHAT_TIMEOUT,
        }
    }
}

impl FromRef<GatewayState> for Key {
    fn from_ref(state: &GatewayState) -> Key {
        state.key.clone()
    }
}

/// Build the gateway HTTP router.
pub fn create_router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(handlers::chat_page))
        .route("/upload", post(handlers::upload))
        .route("/chat", post(handlers::chat))
        .route("/reset", post(handlers::reset))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, Response, StatusCode};
    use httpmock::{Method::GET, Method::POST, MockServer};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const BOUNDARY: &str = "gateway-test-boundary";

    fn test_state(backend_url: &str) -> GatewayState {
        GatewayState {
            http: reqwest::Client::new(),
            backend_url: backend_url.trim_end_matches('/').to_string(),
            sessions: SessionStore::new(),
            key: Key::generate(),
            chat_timeout: Duration::from_millis(200),
        }
    }

    fn upload_request(filename: &str, payload: &[u8], cookie: Option<&str>) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        builder.body(Body::from(body)).expect("request")
    }

    fn json_request(uri: &str, payload: Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        builder
            .body(Body::from(payload.to_string()))
            .expect("request")
    }

    fn session_cookie(response: &Response<Body>) -> Option<String> {
        response
            .headers()
            .get("set-cookie")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(ToString::to_string)
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn chat_without_an_active_document_never_contacts_the_backend() {
        let server = MockServer::start_async().await;
        let backend_chat = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat");
                then.status(200).json_body(json!({ "answer": "x" }));
            })
            .await;
        let app = create_router(test_state(&server.base_url()));

        let response = app
            .oneshot(json_request("/chat", json!({ "question": "Hi?" }), None))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("No active document"));
        backend_chat.assert_hits(0);
    }

    #[tokio::test]
    async fn upload_rejects_files_without_pdf_extension() {
        let server = MockServer::start_async().await;
        let backend_upload = server
            .mock_async(|when, then| {
                when.method(POST).path("/upload-pdf");
                then.status(200).json_body(json!({ "doc_id": "d1" }));
            })
            .await;
        let app = create_router(test_state(&server.base_url()));

        let response = app
            .oneshot(upload_request("notes.txt", b"text", None))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("PDF"));
        backend_upload.assert_hits(0);
    }

    #[tokio::test]
    async fn upload_finds_the_file_behind_other_form_fields() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/upload-pdf");
                then.status(200).json_body(json!({
                    "doc_id": "d1",
                    "message": "PDF processed and ingested successfully"
                }));
            })
            .await;
        let app = create_router(test_state(&server.base_url()));

        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; \
                 name=\"description\"\r\n\r\nquarterly report\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"report.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"%PDF-1.5 fake");
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request");

        let response = app.oneshot(request).await.expect("upload response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["doc_id"], "d1");
    }

    #[tokio::test]
    async fn upload_chat_reset_flow_tracks_the_session() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/upload-pdf");
                then.status(200).json_body(json!({
                    "doc_id": "d1",
                    "message": "PDF processed and ingested successfully",
                    "filename": "report.pdf"
                }));
            })
            .await;
        let backend_chat = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat")
                    .json_body_partial(json!({ "doc_id": "d1" }).to_string());
                then.status(200).json_body(json!({
                    "answer": "A concise summary.",
                    "sources": [
                        { "page_number": 1, "snippet": "intro", "doc_id": "d1" }
                    ]
                }));
            })
            .await;
        let app = create_router(test_state(&server.base_url()));

        // Upload activates the document and sets the session cookie.
        let response = app
            .clone()
            .oneshot(upload_request("report.pdf", b"%PDF-1.5 fake", None))
            .await
            .expect("upload response");
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response).expect("session cookie set");
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["doc_id"], "d1");
        assert_eq!(body["filename"], "report.pdf");

        // Chat forwards the session's doc_id and normalizes the response.
        let response = app
            .clone()
            .oneshot(json_request(
                "/chat",
                json!({ "question": "What is the summary?" }),
                Some(&cookie),
            ))
            .await
            .expect("chat response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["answer"], "A concise summary.");
        assert_eq!(body["sources"][0]["doc_id"], "d1");
        assert!(!body["timestamp"].as_str().unwrap().is_empty());
        backend_chat.assert();

        // Reset clears the record; the same cookie no longer resolves a document.
        let response = app
            .clone()
            .oneshot(json_request("/reset", json!({}), Some(&cookie)))
            .await
            .expect("reset response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(json_request(
                "/chat",
                json!({ "question": "Still there?" }),
                Some(&cookie),
            ))
            .await
            .expect("chat response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("No active document"));
    }

    #[tokio::test]
    async fn slow_backend_chat_maps_to_request_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/upload-pdf");
                then.status(200)
                    .json_body(json!({ "doc_id": "d1", "message": "ok" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat");
                then.status(200)
                    .delay(Duration::from_millis(600))
                    .json_body(json!({ "answer": "late" }));
            })
            .await;
        let app = create_router(test_state(&server.base_url()));

        let response = app
            .clone()
            .oneshot(upload_request("report.pdf", b"%PDF-1.5 fake", None))
            .await
            .expect("upload response");
        let cookie = session_cookie(&response).expect("session cookie set");

        let response = app
            .oneshot(json_request(
                "/chat",
                json!({ "question": "Slow?" }),
                Some(&cookie),
            ))
            .await
            .expect("chat response");

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("too long"));
    }

    #[tokio::test]
    async fn unreachable_backend_maps_to_a_generic_failure() {
        // Nothing listens on port 9; the connection is refused immediately.
        let app = create_router(test_state("http://127.0.0.1:9"));

        let response = app
            .oneshot(upload_request("report.pdf", b"%PDF-1.5 fake", None))
            .await
            .expect("upload response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Cannot reach"));
    }

    #[tokio::test]
    async fn health_reports_backend_reachability() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/health");
                then.status(200)
                    .json_body(json!({ "status": "healthy", "message": "ok" }));
            })
            .await;
        let app = create_router(test_state(&server.base_url()));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("health response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["frontend"], "healthy");
        assert_eq!(body["backend"], "healthy");
        assert!(!body["timestamp"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn health_flags_an_unreachable_backend_with_503() {
        let app = create_router(test_state("http://127.0.0.1:9"));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("health response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["frontend"], "healthy");
        assert_eq!(body["backend"], "unreachable");
    }
}
