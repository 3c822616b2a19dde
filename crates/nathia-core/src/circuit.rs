//! Per-dependency circuit breaker
//!
//! `Closed` → `Open` after `failure_threshold` consecutive failures. While
//! open, calls fail fast without touching the dependency. Once the
//! cool-down elapses the breaker goes `HalfOpen` and admits one probe at a
//! time; `success_threshold` probe successes close it again, a probe
//! failure re-opens it and restarts the cool-down.
//!
//! State transitions happen under a mutex. Concurrent failures racing past
//! the threshold may overshoot the count slightly.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::retry::Classify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long the circuit stays open before probing
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Probe successes needed to close from half-open
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
            success_threshold: default_success_threshold(),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be at least 1".to_string());
        }
        if self.success_threshold == 0 {
            return Err("success_threshold must be at least 1".to_string());
        }
        Ok(())
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_ms() -> u64 {
    30_000
}

fn default_success_threshold() -> u32 {
    1
}

/// Failure of a call made through a [`CircuitBreaker`]
#[derive(Debug, Error)]
pub enum CircuitError<E> {
    /// The circuit is open; the dependency was not called
    #[error("circuit open for '{dependency}'")]
    Open { dependency: String },

    /// The dependency was called and failed
    #[error("{0}")]
    Inner(#[source] E),
}

impl<E> CircuitError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

impl<E: Classify> Classify for CircuitError<E> {
    fn http_status(&self) -> Option<u16> {
        match self {
            Self::Open { .. } => None,
            Self::Inner(err) => err.http_status(),
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            // Retrying into an open circuit only burns the budget
            Self::Open { .. } => false,
            Self::Inner(err) => err.is_retryable(),
        }
    }
}

/// Point-in-time view of a breaker, for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub dependency: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    /// Milliseconds since the last recorded failure
    pub last_failure_ms_ago: Option<u64>,
}

struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    half_open_successes: u32,
    last_failure_time: Option<Instant>,
    opened_at: Option<Instant>,
    probe_started: Option<Instant>,
}

/// Circuit breaker guarding a single external dependency
pub struct CircuitBreaker {
    dependency: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(dependency: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            dependency: dependency.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                half_open_successes: 0,
                last_failure_time: None,
                opened_at: None,
                probe_started: None,
            }),
        }
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        CircuitSnapshot {
            dependency: self.dependency.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.config.failure_threshold,
            last_failure_ms_ago: inner
                .last_failure_time
                .map(|t| t.elapsed().as_millis() as u64),
        }
    }

    /// Run `operation` if the circuit admits it.
    ///
    /// Retryable failures count against the breaker. Non-retryable ones
    /// (4xx) prove the dependency answered and count as successes.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        if !self.try_acquire() {
            metrics::counter!("nathia_circuit_rejections_total", "dependency" => self.dependency.clone())
                .increment(1);
            debug!(dependency = %self.dependency, "Circuit open, failing fast");
            return Err(CircuitError::Open {
                dependency: self.dependency.clone(),
            });
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                if err.is_retryable() {
                    self.record_failure();
                } else {
                    self.record_success();
                }
                Err(CircuitError::Inner(err))
            }
        }
    }

    /// Decide whether a call may proceed, moving `Open` → `HalfOpen` once
    /// the cool-down has elapsed.
    fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock();
        let cooldown = self.config.cooldown();

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled = inner
                    .opened_at
                    .map_or(true, |opened| opened.elapsed() >= cooldown);
                if cooled {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.half_open_successes = 0;
                    inner.probe_started = Some(Instant::now());
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                // A probe abandoned mid-flight must not wedge the breaker
                let probe_busy = inner
                    .probe_started
                    .is_some_and(|started| started.elapsed() < cooldown);
                if probe_busy {
                    false
                } else {
                    inner.probe_started = Some(Instant::now());
                    true
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.probe_started = None;
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.failure_count = 0;
                    inner.half_open_successes = 0;
                    inner.opened_at = None;
                    self.transition(&mut inner, CircuitState::Closed);
                    info!(dependency = %self.dependency, "Circuit closed after successful probe");
                }
            }
            // Late result from a call admitted before the circuit opened
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.last_failure_time = Some(now);

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.opened_at = Some(now);
                    self.transition(&mut inner, CircuitState::Open);
                    warn!(
                        dependency = %self.dependency,
                        failures = inner.failure_count,
                        cooldown_ms = self.config.cooldown_ms,
                        "Circuit OPENED"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.failure_count += 1;
                inner.probe_started = None;
                inner.half_open_successes = 0;
                inner.opened_at = Some(now);
                self.transition(&mut inner, CircuitState::Open);
                warn!(dependency = %self.dependency, "Circuit re-OPENED after failed probe");
            }
            CircuitState::Open => {}
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        if inner.state == to {
            return;
        }
        debug!(
            dependency = %self.dependency,
            from = inner.state.as_str(),
            to = to.as_str(),
            "Circuit transition"
        );
        inner.state = to;
        metrics::counter!(
            "nathia_circuit_transitions_total",
            "dependency" => self.dependency.clone(),
            "to" => to.as_str()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "gemini",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                cooldown_ms: 10_000,
                success_threshold: 1,
            },
        )
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), CircuitError<UpstreamError>> {
        cb.call(|| async { Err::<(), _>(UpstreamError::http(503, "down")) }).await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<(), CircuitError<UpstreamError>> {
        cb.call(|| async { Ok::<(), UpstreamError>(()) }).await
    }

    #[tokio::test]
    async fn test_starts_closed() {
        let cb = breaker(3);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(succeed(&cb).await.is_ok());
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_fails_fast() {
        let cb = breaker(3);
        for _ in 0..3 {
            assert!(matches!(fail(&cb).await, Err(CircuitError::Inner(_))));
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let invoked = AtomicU32::new(0);
        let result = cb
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<(), UpstreamError>(())
            })
            .await;

        assert!(matches!(result, Err(CircuitError::Open { ref dependency }) if dependency == "gemini"));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_failures() {
        let cb = breaker(3);
        fail(&cb).await.ok();
        fail(&cb).await.ok();
        succeed(&cb).await.unwrap();
        fail(&cb).await.ok();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 1);
    }

    #[tokio::test]
    async fn test_client_errors_do_not_trip() {
        let cb = breaker(2);
        for _ in 0..5 {
            let result = cb
                .call(|| async { Err::<(), _>(UpstreamError::http(400, "bad prompt")) })
                .await;
            assert!(matches!(result, Err(CircuitError::Inner(_))));
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_probe_closes() {
        let cb = breaker(2);
        fail(&cb).await.ok();
        fail(&cb).await.ok();
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(10_001)).await;

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_single_probe() {
        let cb = breaker(1);
        fail(&cb).await.ok();

        tokio::time::advance(Duration::from_millis(10_001)).await;

        assert!(cb.try_acquire());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(!cb.try_acquire(), "second probe must wait");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens_and_restarts_cooldown() {
        let cb = breaker(1);
        fail(&cb).await.ok();

        tokio::time::advance(Duration::from_millis(10_001)).await;
        fail(&cb).await.ok();
        assert_eq!(cb.state(), CircuitState::Open);

        // Still cooling down from the failed probe
        tokio::time::advance(Duration::from_millis(5_000)).await;
        assert!(matches!(succeed(&cb).await, Err(CircuitError::Open { .. })));

        tokio::time::advance(Duration::from_millis(5_001)).await;
        assert!(succeed(&cb).await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_threshold_above_one() {
        let cb = CircuitBreaker::new(
            "storage",
            CircuitBreakerConfig {
                failure_threshold: 1,
                cooldown_ms: 1_000,
                success_threshold: 2,
            },
        );
        fail(&cb).await.ok();
        tokio::time::advance(Duration::from_millis(1_001)).await;

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_open_error_is_not_retryable() {
        let err: CircuitError<UpstreamError> = CircuitError::Open {
            dependency: "gemini".into(),
        };
        assert!(!err.is_retryable());
        assert!(CircuitError::Inner(UpstreamError::Timeout).is_retryable());
    }

    #[test]
    fn test_error_display_and_source() {
        let open: CircuitError<UpstreamError> = CircuitError::Open {
            dependency: "gemini".into(),
        };
        assert_eq!(open.to_string(), "circuit open for 'gemini'");
        assert!(std::error::Error::source(&open).is_none());

        let inner = CircuitError::Inner(UpstreamError::Timeout);
        assert_eq!(inner.to_string(), UpstreamError::Timeout.to_string());
        assert!(std::error::Error::source(&inner).is_some());
    }
}
