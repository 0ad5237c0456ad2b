//! Server-side session records addressed by a signed cookie token.
//!
//! The cookie carries only an opaque token; the mutable state (active document
//! and filename) lives in this in-process map. Each browser's session is
//! logically independent, so a plain `RwLock` map is sufficient.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Name of the signed session cookie.
pub const SESSION_COOKIE: &str = "ragchat_session";

/// Per-user session state: the single mutable field of the gateway.
#[derive(Debug, Clone)]
pub struct SessionData {
    /// Identifier of the currently active document.
    pub doc_id: String,
    /// Original filename shown back to the user.
    pub filename: String,
}

/// Shared key-value store mapping session tokens to their state.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, SessionData>>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh opaque session token.
    pub fn new_token() -> String {
        Uuid::new_v4().to_string()
    }

    /// Look up the session state for a token.
    pub async fn get(&self, token: &str) -> Option<SessionData> {
        self.inner.read().await.get(token).cloned()
    }

    /// Store (or replace) the session state for a token.
    pub async fn insert(&self, token: String, data: SessionData) {
        self.inner.write().await.insert(token, data);
    }

    /// Drop the session state for a token, if present.
    pub async fn remove(&self, token: &str) {
        self.inner.write().await.remove(token);
    }
}
