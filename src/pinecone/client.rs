//! HTTP client wrapper for the Pinecone control and data planes.

use crate::config::get_config;
use crate::pinecone::types::{
    ChunkMetadata, IndexDescription, PineconeError, QueryMatch, QueryResponse, UpsertResponse,
    VectorUpsert,
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Pinecone API version pinned on every request.
const API_VERSION: &str = "2024-07";

/// Attempts made while waiting for a freshly created index to report ready.
const READY_POLL_ATTEMPTS: u32 = 120;

/// Largest vector group sent in one upsert request. The data plane caps the
/// request payload, so long documents are written in bounded groups.
pub(crate) const UPSERT_BATCH_SIZE: usize = 100;

/// Lightweight HTTP client for Pinecone operations.
///
/// Control-plane calls (describe/create index) go to the controller URL; data-plane
/// calls (upsert/query) go to the per-index host resolved from `describe`, cached
/// after first resolution so the bootstrap check is a cheap no-op once the index
/// exists.
pub struct PineconeService {
    pub(crate) client: Client,
    pub(crate) controller_url: String,
    pub(crate) api_key: String,
    pub(crate) index_name: String,
    pub(crate) namespace: Option<String>,
    pub(crate) dimension: usize,
    pub(crate) ready_poll_interval: Duration,
    pub(crate) index_host: OnceCell<String>,
}

impl PineconeService {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, PineconeError> {
        let config = get_config();
        let client = Client::builder().user_agent("ragchat/0.1").build()?;
        let controller_url =
            normalize_base_url(&config.pinecone_controller_url).map_err(PineconeError::InvalidUrl)?;
        tracing::debug!(
            controller = %controller_url,
            index = %config.pinecone_index_name,
            dimension = config.pinecone_dimension,
            "Initialized Pinecone HTTP client"
        );

        Ok(Self {
            client,
            controller_url,
            api_key: config.pinecone_api_key.clone(),
            index_name: config.pinecone_index_name.clone(),
            namespace: config.pinecone_namespace.clone(),
            dimension: config.pinecone_dimension,
            ready_poll_interval: Duration::from_secs(1),
            index_host: OnceCell::new(),
        })
    }

    /// Ensure the configured index exists, creating it and waiting for readiness if absent.
    pub async fn ensure_index(&self) -> Result<(), PineconeError> {
        if self.index_host.get().is_some() {
            return Ok(());
        }

        match self.describe_index().await? {
            Some(description) if description.status.ready => {
                self.cache_host(description.host);
                tracing::debug!(index = %self.index_name, "Index already exists");
                Ok(())
            }
            Some(_) => self.wait_until_ready().await,
            None => {
                tracing::info!(index = %self.index_name, dimension = self.dimension, "Creating index");
                self.create_index().await?;
                self.wait_until_ready().await
            }
        }
    }

    /// Upsert chunk vectors into the index, returning the number of vectors the
    /// server acknowledged.
    ///
    /// Vectors are written in groups of [`UPSERT_BATCH_SIZE`] so a long document
    /// never exceeds the data plane's request size limit.
    pub async fn upsert_chunks(&self, vectors: Vec<VectorUpsert>) -> Result<usize, PineconeError> {
        if vectors.is_empty() {
            return Ok(0);
        }

        let requested = vectors.len();
        let host = self.data_plane_url().await?;
        let mut acknowledged = 0;

        for batch in vectors.chunks(UPSERT_BATCH_SIZE) {
            let serialized: Vec<Value> = batch
                .iter()
                .map(|vector| {
                    json!({
                        "id": Uuid::new_v4().to_string(),
                        "values": &vector.values,
                        "metadata": &vector.metadata,
                    })
                })
                .collect();

            let mut body = json!({ "vectors": serialized });
            if let Some(namespace) = &self.namespace {
                body["namespace"] = Value::String(namespace.clone());
            }

            let response = self
                .request(Method::POST, &format!("{host}/vectors/upsert"))
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(self.unexpected_status(response, "Pinecone upsert failed").await);
            }

            let payload: UpsertResponse = response.json().await?;
            acknowledged += payload.upserted_count;
        }

        if acknowledged != requested {
            tracing::warn!(
                index = %self.index_name,
                requested,
                acknowledged,
                "Pinecone acknowledged a different vector count than was sent"
            );
        }
        tracing::debug!(
            index = %self.index_name,
            requested,
            upserted = acknowledged,
            "Vectors upserted"
        );
        Ok(acknowledged)
    }

    /// Query the index for the nearest chunks of a single document.
    ///
    /// The equality filter on `doc_id` is applied unconditionally; callers cannot
    /// issue an unscoped similarity search through this client.
    pub async fn query(
        &self,
        vector: Vec<f32>,
        doc_id: &str,
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, PineconeError> {
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "filter": { "doc_id": { "$eq": doc_id } },
            "includeMetadata": true,
        });
        if let Some(namespace) = &self.namespace {
            body["namespace"] = Value::String(namespace.clone());
        }

        let host = self.data_plane_url().await?;
        let response = self
            .request(Method::POST, &format!("{host}/query"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.unexpected_status(response, "Pinecone query failed").await);
        }

        let payload: QueryResponse = response.json().await?;
        Ok(payload.matches)
    }

    async fn describe_index(&self) -> Result<Option<IndexDescription>, PineconeError> {
        let url = format!("{}/indexes/{}", self.controller_url, self.index_name);
        let response = self.request(Method::GET, &url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            _ => Err(self
                .unexpected_status(response, "Index describe failed")
                .await),
        }
    }

    async fn create_index(&self) -> Result<(), PineconeError> {
        let body = json!({
            "name": self.index_name,
            "dimension": self.dimension,
            "metric": "cosine",
            "spec": { "serverless": { "cloud": "aws", "region": "us-east-1" } },
        });

        let url = format!("{}/indexes", self.controller_url);
        let response = self.request(Method::POST, &url).json(&body).send().await?;

        if response.status().is_success() || response.status() == StatusCode::CONFLICT {
            Ok(())
        } else {
            Err(self.unexpected_status(response, "Index create failed").await)
        }
    }

    async fn wait_until_ready(&self) -> Result<(), PineconeError> {
        for _ in 0..READY_POLL_ATTEMPTS {
            if let Some(description) = self.describe_index().await?
                && description.status.ready
            {
                tracing::info!(index = %self.index_name, "Index ready");
                self.cache_host(description.host);
                return Ok(());
            }
            tokio::time::sleep(self.ready_poll_interval).await;
        }
        Err(PineconeError::IndexNotReady(self.index_name.clone()))
    }

    async fn data_plane_url(&self) -> Result<String, PineconeError> {
        let host = self
            .index_host
            .get_or_try_init(|| async {
                let description = self
                    .describe_index()
                    .await?
                    .ok_or_else(|| PineconeError::IndexNotReady(self.index_name.clone()))?;
                Ok::<_, PineconeError>(normalize_host(&description.host))
            })
            .await?;
        Ok(host.clone())
    }

    fn cache_host(&self, host: String) {
        let _ = self.index_host.set(normalize_host(&host));
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn unexpected_status(&self, response: reqwest::Response, context: &str) -> PineconeError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = PineconeError::UnexpectedStatus { status, body };
        tracing::error!(index = %self.index_name, error = %error, "{context}");
        error
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    Ok(parsed.to_string().trim_end_matches('/').to_string())
}

/// Describe responses report the host without a scheme; default to HTTPS.
fn normalize_host(host: &str) -> String {
    let trimmed = host.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::POST, MockServer};

    fn test_service(server: &MockServer) -> PineconeService {
        PineconeService {
            client: Client::builder()
                .user_agent("ragchat-test")
                .build()
                .expect("client"),
            controller_url: server.base_url(),
            api_key: "test-key".into(),
            index_name: "demo-index".into(),
            namespace: Some("demo-ns".into()),
            dimension: 4,
            ready_poll_interval: Duration::from_millis(5),
            index_host: OnceCell::new(),
        }
    }

    #[tokio::test]
    async fn query_scopes_filter_to_requested_document() {
        let server = MockServer::start_async().await;
        let service = test_service(&server);
        service.cache_host(server.base_url());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/query")
                    .json_body_partial(
                        json!({
                            "topK": 5,
                            "filter": { "doc_id": { "$eq": "d1" } },
                            "includeMetadata": true,
                            "namespace": "demo-ns"
                        })
                        .to_string(),
                    );
                then.status(200).json_body(json!({
                    "matches": [
                        {
                            "id": "v-1",
                            "score": 0.91,
                            "metadata": {
                                "doc_id": "d1",
                                "page_number": 2,
                                "chunk_index": 0,
                                "text": "Example chunk"
                            }
                        }
                    ]
                }));
            })
            .await;

        let matches = service
            .query(vec![0.1, 0.2, 0.3, 0.4], "d1", 5)
            .await
            .expect("query request");

        mock.assert();
        assert_eq!(matches.len(), 1);
        let metadata = matches[0].metadata.as_ref().expect("metadata");
        assert_eq!(metadata.doc_id, "d1");
        assert_eq!(metadata.page_number, 2);
    }

    #[tokio::test]
    async fn large_documents_are_upserted_in_bounded_batches() {
        let server = MockServer::start_async().await;
        let service = test_service(&server);
        service.cache_host(server.base_url());

        let vectors: Vec<VectorUpsert> = (0..UPSERT_BATCH_SIZE + 20)
            .map(|i| VectorUpsert {
                values: vec![0.1, 0.2, 0.3, 0.4],
                metadata: ChunkMetadata {
                    doc_id: "d1".into(),
                    page_number: 1,
                    chunk_index: i,
                    text: format!("chunk-{i:03}"),
                },
            })
            .collect();

        // The first hundred chunks land in one request, the remainder in a second.
        let first_batch = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vectors/upsert")
                    .body_contains("chunk-000");
                then.status(200)
                    .json_body(json!({ "upsertedCount": UPSERT_BATCH_SIZE }));
            })
            .await;
        let second_batch = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vectors/upsert")
                    .body_contains("chunk-100");
                then.status(200).json_body(json!({ "upsertedCount": 20 }));
            })
            .await;

        let written = service.upsert_chunks(vectors).await.expect("upsert");

        first_batch.assert();
        second_batch.assert();
        assert_eq!(written, UPSERT_BATCH_SIZE + 20);
    }

    #[tokio::test]
    async fn upsert_surfaces_the_server_acknowledged_count() {
        let server = MockServer::start_async().await;
        let service = test_service(&server);
        service.cache_host(server.base_url());

        let vectors: Vec<VectorUpsert> = (0..3)
            .map(|i| VectorUpsert {
                values: vec![0.1, 0.2, 0.3, 0.4],
                metadata: ChunkMetadata {
                    doc_id: "d1".into(),
                    page_number: 1,
                    chunk_index: i,
                    text: format!("chunk-{i}"),
                },
            })
            .collect();

        let upsert = server
            .mock_async(|when, then| {
                when.method(POST).path("/vectors/upsert");
                then.status(200).json_body(json!({ "upsertedCount": 2 }));
            })
            .await;

        // A partial acknowledgement is reported as-is, never rounded up.
        let written = service.upsert_chunks(vectors).await.expect("upsert");
        upsert.assert();
        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn ensure_index_creates_missing_index_and_polls_until_ready() {
        let server = MockServer::start_async().await;
        let service = test_service(&server);

        let missing = server
            .mock_async(|when, then| {
                when.method(GET).path("/indexes/demo-index");
                then.status(404).json_body(json!({"error": "not found"}));
            })
            .await;

        let created = server
            .mock_async(|when, then| {
                when.method(POST).path("/indexes").json_body_partial(
                    json!({
                        "name": "demo-index",
                        "dimension": 4,
                        "metric": "cosine"
                    })
                    .to_string(),
                );
                then.status(201).json_body(json!({"name": "demo-index"}));
            })
            .await;

        service.describe_index().await.expect("describe");
        missing.assert();
        service.create_index().await.expect("create");
        created.assert();

        // Once the controller reports ready, the poll loop resolves and caches the host.
        missing.delete_async().await;
        let ready = server
            .mock_async(|when, then| {
                when.method(GET).path("/indexes/demo-index");
                then.status(200).json_body(json!({
                    "name": "demo-index",
                    "host": "demo-index.svc.pinecone.io",
                    "status": { "ready": true, "state": "Ready" }
                }));
            })
            .await;

        service.wait_until_ready().await.expect("ready");
        ready.assert();
        assert_eq!(
            service.index_host.get().map(String::as_str),
            Some("https://demo-index.svc.pinecone.io")
        );
    }
}
