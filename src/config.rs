use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the ingestion/answer service.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// API key for the Azure OpenAI resource.
    pub azure_openai_key: String,
    /// Base endpoint of the Azure OpenAI resource, e.g. `https://my-resource.openai.azure.com`.
    pub azure_openai_endpoint: String,
    /// Chat-completions deployment name.
    pub azure_openai_deployment: String,
    /// API version passed on every Azure OpenAI request.
    pub azure_openai_version: String,
    /// Embeddings deployment name.
    pub azure_openai_embedding_deployment: String,
    /// Sampling temperature used for answer generation.
    pub openai_temperature: f32,
    /// Upper bound, in seconds, on a single chat-completion request.
    pub completion_timeout_secs: u64,
    /// API key for the Pinecone project.
    pub pinecone_api_key: String,
    /// Name of the Pinecone index holding document chunks.
    pub pinecone_index_name: String,
    /// Optional namespace scoping all reads and writes within the index.
    pub pinecone_namespace: Option<String>,
    /// Dimensionality of the embedding vectors stored in the index.
    pub pinecone_dimension: usize,
    /// Control-plane base URL (overridable so tests can point at a mock).
    pub pinecone_controller_url: String,
    /// Number of nearest chunks retrieved per question.
    pub retrieval_top_k: usize,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Character overlap carried between adjacent chunks.
    pub chunk_overlap: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            azure_openai_key: load_env("AZURE_OPENAI_KEY")?,
            azure_openai_endpoint: load_env("AZURE_OPENAI_ENDPOINT")?,
            azure_openai_deployment: load_env("AZURE_OPENAI_DEPLOYMENT")?,
            azure_openai_version: load_env_optional("AZURE_OPENAI_VERSION")
                .unwrap_or_else(|| "2024-02-01".to_string()),
            azure_openai_embedding_deployment: load_env_optional(
                "AZURE_OPENAI_EMBEDDING_DEPLOYMENT",
            )
            .unwrap_or_else(|| "text-embedding-ada-002".to_string()),
            openai_temperature: parse_optional("OPENAI_TEMPERATURE", 0.2)?,
            completion_timeout_secs: parse_optional("COMPLETION_TIMEOUT_SECS", 60)?,
            pinecone_api_key: load_env("PINECONE_API_KEY")?,
            pinecone_index_name: load_env_optional("PINECONE_INDEX_NAME")
                .unwrap_or_else(|| "azure-openai-rag-index".to_string()),
            pinecone_namespace: load_env_optional("PINECONE_NAMESPACE"),
            pinecone_dimension: parse_optional("PINECONE_DIMENSION", 1536)?,
            pinecone_controller_url: load_env_optional("PINECONE_CONTROLLER_URL")
                .unwrap_or_else(|| "https://api.pinecone.io".to_string()),
            retrieval_top_k: parse_optional("RETRIEVAL_TOP_K", 5)?,
            chunk_size: parse_optional("CHUNK_SIZE", 1000)?,
            chunk_overlap: parse_optional("CHUNK_OVERLAP", 150)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

/// Runtime configuration for the browser-facing gateway.
#[derive(Debug)]
pub struct GatewayConfig {
    /// Base URL of the ingestion/answer service.
    pub backend_api_url: String,
    /// Optional cookie-signing secret; a random key is generated when absent.
    pub secret_key: Option<String>,
    /// Optional override for the gateway HTTP port.
    pub gateway_port: Option<u16>,
}

impl GatewayConfig {
    /// Load gateway configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            backend_api_url: load_env_optional("BACKEND_API_URL")
                .unwrap_or_else(|| "http://localhost:8000".to_string()),
            secret_key: load_env_optional("SECRET_KEY"),
            gateway_port: load_env_optional("GATEWAY_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("GATEWAY_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        endpoint = %config.azure_openai_endpoint,
        deployment = %config.azure_openai_deployment,
        index = %config.pinecone_index_name,
        namespace = ?config.pinecone_namespace,
        top_k = config.retrieval_top_k,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
