//! Retry executor for outbound calls
//!
//! Exponential backoff with optional jitter. The delay before retry `n`
//! (1-indexed) is `min(max_delay, min_delay * factor^(n-1))`.
//!
//! ## Retry classification
//!
//! - HTTP 4xx: non-retryable, aborts immediately
//! - HTTP 5xx, network errors, timeouts: retryable
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nathia_core::retry::{with_retry, RetryPolicy};
//!
//! let reply = with_retry(&RetryPolicy::api_call(), |_attempt| provider.generate(&req)).await?;
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::UpstreamError;

/// Backoff tuning for one call site
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry
    pub min_delay_ms: u64,
    /// Cap for exponential growth
    pub max_delay_ms: u64,
    /// Growth factor between retries
    pub backoff_factor: f64,
    /// Random spread applied to each delay, as a ratio (0.2 = ±20%)
    #[serde(default)]
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::api_call()
    }
}

impl RetryPolicy {
    /// Policy for AI provider calls: 3 retries, 1s-8s, factor 2
    pub const fn api_call() -> Self {
        Self {
            max_retries: 3,
            min_delay_ms: 1_000,
            max_delay_ms: 8_000,
            backoff_factor: 2.0,
            jitter: 0.0,
        }
    }

    /// Policy for uploads: 3 retries, 2s-15s, factor 2
    pub const fn upload() -> Self {
        Self {
            max_retries: 3,
            min_delay_ms: 2_000,
            max_delay_ms: 15_000,
            backoff_factor: 2.0,
            jitter: 0.0,
        }
    }

    /// A policy that never retries
    pub const fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::api_call()
        }
    }

    /// Spread each delay by up to `ratio` in either direction
    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter = ratio;
        self
    }

    /// Un-jittered delay before retry `retry` (1-indexed)
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let grown = self.min_delay_ms as f64 * self.backoff_factor.powi(exponent);
        let capped = grown.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay actually slept before retry `retry`, jitter applied
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if self.jitter <= 0.0 {
            return base;
        }

        let ratio = self.jitter.min(1.0);
        let spread = rand::thread_rng().gen_range(-ratio..=ratio);
        let jittered = (base.as_millis() as f64 * (1.0 + spread)).clamp(0.0, self.max_delay_ms as f64);
        Duration::from_millis(jittered as u64)
    }

    /// Check the policy is internally consistent
    pub fn validate(&self) -> Result<(), String> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(format!(
                "min_delay_ms ({}) exceeds max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            ));
        }
        if !(self.backoff_factor >= 1.0) {
            return Err(format!("backoff_factor must be >= 1.0, got {}", self.backoff_factor));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(format!("jitter must lie in [0, 1], got {}", self.jitter));
        }
        Ok(())
    }
}

/// Decides whether a failure is worth another attempt
pub trait Classify {
    /// HTTP status carried by the failure, if any
    fn http_status(&self) -> Option<u16> {
        None
    }

    /// Client errors (4xx) abort; everything else is retried
    fn is_retryable(&self) -> bool {
        !matches!(self.http_status(), Some(400..=499))
    }
}

impl Classify for UpstreamError {
    fn http_status(&self) -> Option<u16> {
        self.status()
    }
}

/// Terminal failure of [`with_retry`]
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// A non-retryable failure stopped the loop early
    #[error("non-retryable failure on attempt {attempt}: {source}")]
    Aborted { attempt: u32, source: E },

    /// Every allowed attempt failed
    #[error("failed after {attempts} attempts: {source}")]
    Exhausted { attempts: u32, source: E },
}

impl<E> RetryError<E> {
    /// Number of times the operation was invoked
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Aborted { attempt, .. } => *attempt,
            Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// The last failure observed
    pub fn last_error(&self) -> &E {
        match self {
            Self::Aborted { source, .. } | Self::Exhausted { source, .. } => source,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            Self::Aborted { source, .. } | Self::Exhausted { source, .. } => source,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Execute an async operation with retry logic.
///
/// `operation` receives the 1-indexed attempt number. Non-retryable
/// failures return immediately; retryable ones sleep (yielding the task)
/// and try again until `policy.max_retries` extra attempts are spent.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + fmt::Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, "Outbound call succeeded after retrying");
                }
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => {
                warn!(attempt, error = %err, "Non-retryable failure, aborting");
                return Err(RetryError::Aborted {
                    attempt,
                    source: err,
                });
            }
            Err(err) => {
                if attempt > policy.max_retries {
                    warn!(attempts = attempt, error = %err, "Retries exhausted");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        source: err,
                    });
                }

                let delay = policy.delay_for_retry(attempt);
                metrics::counter!("nathia_retry_attempts_total").increment(1);
                warn!(
                    attempt,
                    max_attempts = policy.max_retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Outbound call failed, retrying"
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}
