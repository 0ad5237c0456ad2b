//! Azure OpenAI client for embeddings and chat completions.
//!
//! Both capabilities live on one client because they share the resource endpoint,
//! API key, and version; only the deployment segment of the URL differs. Timeouts
//! on the completion call are classified here, at the point of failure, so callers
//! receive a structured [`OpenAiError::Timeout`] instead of sniffing error text.

use crate::config::get_config;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Largest input array sent in one embeddings request. Azure enforces a
/// per-request cap on the input array, so long documents are embedded in
/// bounded groups.
pub(crate) const EMBEDDING_BATCH_SIZE: usize = 16;

/// Errors raised by the Azure OpenAI client.
#[derive(Debug, Error)]
pub enum OpenAiError {
    /// The request exceeded the configured time budget.
    #[error("Azure OpenAI request timed out: {0}")]
    Timeout(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),
    /// The API responded with an unexpected status code.
    #[error("Unexpected Azure OpenAI response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the API.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// The API returned a success status but no usable payload.
    #[error("Azure OpenAI returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for OpenAiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Http(err)
        }
    }
}

/// Single turn in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker role: `system`, `user`, or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a `system` message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    /// Build a `user` message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// HTTP client for one Azure OpenAI resource.
pub struct AzureOpenAiClient {
    pub(crate) client: Client,
    pub(crate) endpoint: String,
    pub(crate) api_key: String,
    pub(crate) api_version: String,
    pub(crate) chat_deployment: String,
    pub(crate) embedding_deployment: String,
    pub(crate) temperature: f32,
    pub(crate) completion_timeout: Duration,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl AzureOpenAiClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, OpenAiError> {
        let config = get_config();
        let client = Client::builder().user_agent("ragchat/0.1").build()?;
        tracing::debug!(
            endpoint = %config.azure_openai_endpoint,
            chat_deployment = %config.azure_openai_deployment,
            embedding_deployment = %config.azure_openai_embedding_deployment,
            "Initialized Azure OpenAI client"
        );

        Ok(Self {
            client,
            endpoint: config.azure_openai_endpoint.trim_end_matches('/').to_string(),
            api_key: config.azure_openai_key.clone(),
            api_version: config.azure_openai_version.clone(),
            chat_deployment: config.azure_openai_deployment.clone(),
            embedding_deployment: config.azure_openai_embedding_deployment.clone(),
            temperature: config.openai_temperature,
            completion_timeout: Duration::from_secs(config.completion_timeout_secs),
        })
    }

    /// Produce an embedding vector for each supplied text, preserving input order.
    ///
    /// Inputs are sent in groups of [`EMBEDDING_BATCH_SIZE`] so a long document
    /// never exceeds the API's per-request input cap.
    pub async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, OpenAiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.deployment_url(&self.embedding_deployment, "embeddings");
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(EMBEDDING_BATCH_SIZE) {
            let response = self
                .client
                .post(&url)
                .header("api-key", &self.api_key)
                .query(&[("api-version", &self.api_version)])
                .json(&json!({ "input": batch }))
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(unexpected_status(response).await);
            }

            let payload: EmbeddingResponse = response.json().await?;
            let mut data = payload.data;
            data.sort_by_key(|item| item.index);
            embeddings.extend(data.into_iter().map(|item| item.embedding));
        }

        Ok(embeddings)
    }

    /// Run a chat completion over the supplied messages and return the generated text.
    ///
    /// The request carries the configured temperature and an explicit per-request
    /// timeout; exceeding it yields [`OpenAiError::Timeout`].
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, OpenAiError> {
        let url = self.deployment_url(&self.chat_deployment, "chat/completions");
        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .query(&[("api-version", &self.api_version)])
            .timeout(self.completion_timeout)
            .json(&json!({
                "messages": messages,
                "temperature": self.temperature,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }

        let payload: CompletionResponse = response.json().await?;
        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(OpenAiError::EmptyResponse)
    }

    fn deployment_url(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}",
            self.endpoint, deployment, operation
        )
    }
}

async fn unexpected_status(response: reqwest::Response) -> OpenAiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let error = OpenAiError::UnexpectedStatus { status, body };
    tracing::error!(error = %error, "Azure OpenAI request failed");
    error
}
