use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

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

/// Runtime configuration for the studydeck ingestion service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Text-generation backend used for summaries.
    pub generation_provider: GenerationProvider,
    /// Model identifier passed to the generation backend.
    pub generation_model: String,
    /// Sampling temperature for summary generation.
    pub generation_temperature: f32,
    /// API key for OpenAI-compatible endpoints.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Base URL of a local Ollama runtime.
    pub ollama_url: String,
    /// Embedding backend, or `none` to skip embeddings entirely.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality every produced vector must have.
    pub embedding_dimension: usize,
    /// Default number of summary sections requested per document.
    pub summary_count: usize,
    /// Character ceiling applied to text before it is sent for summarization.
    pub summary_input_char_limit: usize,
    /// Chunk size, in characters, used by the text splitter.
    pub text_splitter_chunk_size: usize,
    /// Overlap, in characters, between consecutive chunks.
    pub text_splitter_chunk_overlap: usize,
    /// Number of leading characters embedded per document.
    pub embedding_prefix_chars: usize,
    /// Number of leading characters kept in the ingestion result.
    pub stored_text_prefix_chars: usize,
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: usize,
    /// Results kept by the in-memory store before the oldest are evicted.
    pub result_store_capacity: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported text-generation backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// Hosted OpenAI chat completions.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
    /// Embeddings disabled; results carry no vector.
    None,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let generation_provider: GenerationProvider =
            load_env_or("GENERATION_PROVIDER", GenerationProvider::OpenAI)?;
        let embedding_provider: EmbeddingProvider =
            load_env_or("EMBEDDING_PROVIDER", EmbeddingProvider::OpenAI)?;
        let openai_api_key = load_env_optional("OPENAI_API_KEY");

        let needs_openai = generation_provider == GenerationProvider::OpenAI
            || embedding_provider == EmbeddingProvider::OpenAI;
        if needs_openai && openai_api_key.is_none() {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".to_string()));
        }

        let embedding_dimension: usize = load_env_or("EMBEDDING_DIMENSION", 1536)?;
        if embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()));
        }
        let text_splitter_chunk_size: usize = load_env_or("TEXT_SPLITTER_CHUNK_SIZE", 4000)?;
        if text_splitter_chunk_size == 0 {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_SIZE".to_string(),
            ));
        }

        let result_store_capacity: usize = load_env_or("RESULT_STORE_CAPACITY", 1_000)?;
        if result_store_capacity == 0 {
            return Err(ConfigError::InvalidValue("RESULT_STORE_CAPACITY".to_string()));
        }

        Ok(Self {
            generation_provider,
            generation_model: load_env_optional("GENERATION_MODEL")
                .unwrap_or_else(|| "gpt-4o".to_string()),
            generation_temperature: load_env_or("GENERATION_TEMPERATURE", 0.2)?,
            openai_api_key,
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            embedding_provider,
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-ada-002".to_string()),
            embedding_dimension,
            summary_count: load_env_or("SUMMARY_COUNT", 5)?,
            summary_input_char_limit: load_env_or("SUMMARY_INPUT_CHAR_LIMIT", 12_000)?,
            text_splitter_chunk_size,
            text_splitter_chunk_overlap: load_env_or("TEXT_SPLITTER_CHUNK_OVERLAP", 200)?,
            embedding_prefix_chars: load_env_or("EMBEDDING_PREFIX_CHARS", 8_000)?,
            stored_text_prefix_chars: load_env_or("STORED_TEXT_PREFIX_CHARS", 10_000)?,
            max_upload_bytes: load_env_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            result_store_capacity,
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

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "none" | "off" | "disabled" => Ok(Self::None),
            _ => Err(()),
        }
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
        generation_provider = ?config.generation_provider,
        generation_model = %config.generation_model,
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
