//! Generative AI provider
//!
//! [`HttpGenerator`] speaks the Gemini `generateContent` shape. Every
//! failure is mapped onto [`UpstreamError`] so the retry executor can
//! classify it: HTTP statuses keep their code, transport failures become
//! `Network`, and timeouts become `Timeout`.

use async_trait::async_trait;
use nathia_core::UpstreamError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Everything the provider needs for one reply
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// System instruction (persona and safety guidance)
    pub system: String,
    /// Profile and recent history
    pub context: String,
    /// The user's message for this turn
    pub message: String,
}

impl GenerationRequest {
    /// Single prompt combining context and message
    pub fn prompt(&self) -> String {
        if self.context.is_empty() {
            self.message.clone()
        } else {
            format!("{}\n\nMensagem atual:\n{}", self.context, self.message)
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, UpstreamError>;

    fn name(&self) -> &str;
}

/// Connection settings for an HTTP provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub endpoint: String,
    /// Sent as `x-goog-api-key`; never logged
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
                .to_string(),
            api_key: None,
            timeout_ms: 15_000,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Map a transport-level reqwest failure
pub(crate) fn transport_error(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout
    } else if let Some(status) = err.status() {
        UpstreamError::http(status.as_u16(), err.to_string())
    } else {
        UpstreamError::Network(err.to_string())
    }
}

/// Turn a non-success response into an HTTP error, keeping a short body excerpt
pub(crate) async fn status_error(response: reqwest::Response) -> UpstreamError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(200).collect();
    UpstreamError::http(status, excerpt)
}

pub struct HttpGenerator {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpGenerator {
    pub fn new(config: ProviderConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(transport_error)?;
        Ok(Self { client, config })
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, UpstreamError> {
        let body = json!({
            "systemInstruction": { "parts": [{ "text": request.system }] },
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt() }] }],
        });

        let mut builder = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("x-goog-api-key", key);
        }

        let response = builder.send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout
            } else {
                UpstreamError::InvalidResponse(e.to_string())
            }
        })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(UpstreamError::InvalidResponse("empty candidate".to_string()));
        }

        debug!(chars = text.len(), "Provider reply received");
        Ok(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
