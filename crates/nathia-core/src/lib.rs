//! NAT-IA Core
//!
//! Core types, configuration and resilience primitives shared across the
//! NAT-IA safety components.
//!
//! This crate provides:
//! - Message, sentiment, risk and moderation types
//! - The error taxonomy (validation, pipeline, upstream failures)
//! - Immutable configuration with an atomic reload handle
//! - Retry executor with exponential backoff
//! - Per-dependency circuit breaker
//! - Bounded base64 payload decoding

pub mod circuit;
pub mod config;
pub mod error;
pub mod payload;
pub mod resilience;
pub mod retry;
pub mod types;

pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitError, CircuitSnapshot, CircuitState};
pub use config::{ConfigHandle, ContentSignals, NathiaConfig, RecommendationWeights, TextLimits, Thresholds};
pub use error::{Error, ErrorCode, NathiaError, Result, UpstreamError, ValidationError};
pub use resilience::Resilient;
pub use retry::{with_retry, Classify, RetryError, RetryPolicy};
pub use types::{
    EmergencyContact, Message, ModerationAnalysis, ModerationDecision, ResourceId, RiskAssessment,
    RiskLevel, Role, SentimentAnalysis, Valence,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ConfigHandle, NathiaConfig, Thresholds};
    pub use crate::error::{Error, NathiaError, Result, UpstreamError, ValidationError};
    pub use crate::retry::{with_retry, Classify, RetryPolicy};
    pub use crate::types::{Message, ModerationAnalysis, RiskAssessment, RiskLevel, Role};
}
