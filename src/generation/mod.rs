//! Text-generation backends used to write summary sections.
//!
//! Each client sends one non-streaming request and returns the raw reply text. Parsing the reply
//! into sections is the summarizer's job, so clients never inspect content beyond the envelope.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::{Config, GenerationProvider};

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider was unreachable or rejected the credentials.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate text: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to a generation backend.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Complete prompt, sent as a single user message.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Interface implemented by text-generation providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Produce a completion for the prompt.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError>;
}

/// Build the generation client selected by configuration.
pub fn get_generation_client(
    config: &Config,
) -> Result<Arc<dyn GenerationClient>, GenerationClientError> {
    match config.generation_provider {
        GenerationProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                GenerationClientError::ProviderUnavailable("OPENAI_API_KEY is not set".into())
            })?;
            Ok(Arc::new(OpenAiGenerationClient::new(
                config.openai_base_url.clone(),
                api_key,
            )?))
        }
        GenerationProvider::Ollama => Ok(Arc::new(OllamaGenerationClient::new(
            config.ollama_url.clone(),
        )?)),
    }
}

fn build_http_client() -> Result<Client, GenerationClientError> {
    Client::builder()
        .user_agent("studydeck/generation")
        .build()
        .map_err(|error| {
            GenerationClientError::ProviderUnavailable(format!(
                "failed to construct HTTP client: {error}"
            ))
        })
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GenerationClientError> {
    let status = response.status();
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(GenerationClientError::ProviderUnavailable(format!(
            "provider rejected credentials ({status})"
        )));
    }
    if status == StatusCode::NOT_FOUND {
        return Err(GenerationClientError::ProviderUnavailable(format!(
            "endpoint {} returned 404",
            response.url()
        )));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GenerationClientError::GenerationFailed(format!(
            "provider returned {status}: {body}"
        )));
    }
    Ok(response)
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiGenerationClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiGenerationClient {
    /// Create a client for `base_url` (for example `https://api.openai.com/v1`).
    pub fn new(base_url: String, api_key: String) -> Result<Self, GenerationClientError> {
        Ok(Self {
            http: build_http_client()?,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl GenerationClient for OpenAiGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        let payload = json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": [{ "role": "user", "content": request.prompt }],
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;
        let response = check_status(response).await?;

        let body: ChatCompletionResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode chat completion: {error}"
            ))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                GenerationClientError::InvalidResponse("completion contained no text".into())
            })
    }
}

/// Client for a local Ollama runtime's `/api/generate` endpoint.
pub struct OllamaGenerationClient {
    http: Client,
    base_url: String,
}

impl OllamaGenerationClient {
    /// Create a client for the runtime at `base_url`.
    pub fn new(base_url: String) -> Result<Self, GenerationClientError> {
        Ok(Self {
            http: build_http_client()?,
            base_url,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl GenerationClient for OllamaGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        let payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": { "temperature": request.temperature },
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;
        let response = check_status(response).await?;

        let body: OllamaResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(GenerationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}
