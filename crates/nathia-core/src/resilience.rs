//! Breaker-guarded retry execution for one dependency

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::circuit::{CircuitBreaker, CircuitError};
use crate::error::{ErrorCode, NathiaError, UpstreamError};
use crate::retry::{with_retry, Classify, RetryError, RetryPolicy};

/// Combines a shared [`CircuitBreaker`] with a [`RetryPolicy`].
///
/// Every attempt goes through the breaker, so a circuit that opens halfway
/// through the retry loop stops it on the next attempt.
#[derive(Clone)]
pub struct Resilient {
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
}

impl Resilient {
    pub fn new(breaker: Arc<CircuitBreaker>, policy: RetryPolicy) -> Self {
        Self { breaker, policy }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryError<CircuitError<E>>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let breaker = &self.breaker;
        with_retry(&self.policy, |attempt| {
            let fut = operation(attempt);
            async move { breaker.call(|| fut).await }
        })
        .await
    }
}

impl From<RetryError<CircuitError<UpstreamError>>> for NathiaError {
    fn from(err: RetryError<CircuitError<UpstreamError>>) -> Self {
        let attempts = err.attempts();
        match err.into_inner() {
            CircuitError::Open { dependency } => NathiaError::new(
                ErrorCode::ProviderUnavailable,
                format!("circuit open for '{}'", dependency),
            ),
            CircuitError::Inner(UpstreamError::Http { status: 429, message }) => NathiaError::new(
                ErrorCode::LimitExceeded,
                "limit_exceeded",
            )
            .with_source(UpstreamError::http(429, message)),
            CircuitError::Inner(inner) if !inner.is_retryable() => NathiaError::new(
                ErrorCode::ProviderRejected,
                format!("provider rejected the request on attempt {}", attempts),
            )
            .with_source(inner),
            CircuitError::Inner(inner) => NathiaError::new(
                ErrorCode::ProviderExhausted,
                format!("provider failed after {} attempts", attempts),
            )
            .with_source(inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{CircuitBreakerConfig, CircuitState};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn resilient(threshold: u32) -> Resilient {
        let breaker = Arc::new(CircuitBreaker::new(
            "gemini",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                cooldown_ms: 60_000,
                success_threshold: 1,
            },
        ));
        Resilient::new(breaker, RetryPolicy::api_call())
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_stops_retry_loop() {
        let guard = resilient(2);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = guard
            .execute(|_attempt| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(UpstreamError::http(503, "down"))
            })
            .await;

        let err = result.unwrap_err();
        // Two real calls open the circuit, the third attempt is rejected
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(err.attempts(), 3);
        assert!(err.last_error().is_open());
        assert_eq!(guard.breaker().state(), CircuitState::Open);

        let nathia: NathiaError = err.into();
        assert_eq!(nathia.code, ErrorCode::ProviderUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_maps_to_distinct_code() {
        let guard = resilient(10);

        let result: Result<(), _> = guard
            .execute(|_attempt| async { Err(UpstreamError::Timeout) })
            .await;

        let nathia: NathiaError = result.unwrap_err().into();
        assert_eq!(nathia.code, ErrorCode::ProviderExhausted);
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_limit_exceeded() {
        let guard = resilient(10);

        let result: Result<(), _> = guard
            .execute(|_attempt| async { Err(UpstreamError::http(429, "quota")) })
            .await;

        let nathia: NathiaError = result.unwrap_err().into();
        assert_eq!(nathia.code, ErrorCode::LimitExceeded);
    }
}
