//! Q&A provider client
//!
//! POST `{question, userId}` → `{answer, sources, cached}`. A 429 from the
//! provider surfaces as `limit_exceeded` and is never retried.

use crate::provider::{status_error, transport_error, ProviderConfig};
use async_trait::async_trait;
use nathia_core::{Error, NathiaError, Resilient, Result, UpstreamError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaAnswer {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub cached: bool,
}

#[async_trait]
pub trait QaProvider: Send + Sync {
    async fn ask(&self, question: &str, user_id: &str) -> std::result::Result<QaAnswer, UpstreamError>;
}

pub struct HttpQaClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpQaClient {
    pub fn new(config: ProviderConfig) -> std::result::Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(transport_error)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl QaProvider for HttpQaClient {
    async fn ask(&self, question: &str, user_id: &str) -> std::result::Result<QaAnswer, UpstreamError> {
        let mut builder = self
            .client
            .post(&self.config.endpoint)
            .json(&json!({ "question": question, "userId": user_id }));
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        response
            .json::<QaAnswer>()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
    }
}

/// Q&A calls behind the dependency's breaker and retry policy
pub struct QaService {
    provider: Arc<dyn QaProvider>,
    resilient: Resilient,
}

impl QaService {
    pub fn new(provider: Arc<dyn QaProvider>, resilient: Resilient) -> Self {
        Self {
            provider,
            resilient,
        }
    }

    pub async fn ask(&self, question: &str, user_id: &str) -> Result<QaAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyText.into());
        }

        let result = self
            .resilient
            .execute(|_| self.provider.ask(question, user_id))
            .await;

        match result {
            Ok(answer) => {
                info!(cached = answer.cached, sources = answer.sources.len(), "Q&A answered");
                Ok(answer)
            }
            Err(e) => {
                let err = NathiaError::from(e);
                warn!(code = %err.code, error = %err, "Q&A request failed");
                Err(Error::Nathia(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nathia_core::{CircuitBreaker, CircuitBreakerConfig, ErrorCode, RetryPolicy};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StatusProvider {
        status: u16,
        calls: AtomicU32,
    }

    #[async_trait]
    impl QaProvider for StatusProvider {
        async fn ask(&self, _q: &str, _u: &str) -> std::result::Result<QaAnswer, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(UpstreamError::http(self.status, "slow down"))
        }
    }

    fn resilient() -> Resilient {
        Resilient::new(
            Arc::new(CircuitBreaker::new("qa", CircuitBreakerConfig::default())),
            RetryPolicy::api_call(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_not_retried() {
        let provider = Arc::new(StatusProvider {
            status: 429,
            calls: AtomicU32::new(0),
        });
        let service = QaService::new(provider.clone(), resilient());

        let err = service.ask("Quando o bebê começa a sentar?", "u1").await.unwrap_err();
        match err {
            Error::Nathia(e) => {
                assert_eq!(e.code, ErrorCode::LimitExceeded);
                assert_eq!(e.message, "limit_exceeded");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let provider = Arc::new(StatusProvider {
            status: 500,
            calls: AtomicU32::new(0),
        });
        let service = QaService::new(provider.clone(), resilient());

        let err = service.ask("  ", "u1").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
