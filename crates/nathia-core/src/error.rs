//! Error types for NAT-IA

use serde::Serialize;
use std::fmt;

/// Result type alias using NAT-IA's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for NAT-IA operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad caller input, never retried
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal failure inside the triage/moderation/chat pipeline
    #[error(transparent)]
    Nathia(#[from] NathiaError),

    /// Classifier execution errors
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error was caused by the caller's input
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Rejected input. Surfaced to callers as a 4xx-equivalent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("text must not be empty")]
    EmptyText,

    #[error("text has {actual} characters, limit is {max}")]
    TextTooLong { max: usize, actual: usize },

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("encoded payload of {encoded_len} bytes exceeds the {max_bytes} byte limit")]
    PayloadTooLarge { max_bytes: usize, encoded_len: usize },

    #[error("payload is not valid base64: {0}")]
    InvalidEncoding(String),
}

/// Machine-readable code attached to every [`NathiaError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    GenerationFailed,
    ProviderUnavailable,
    ProviderExhausted,
    ProviderRejected,
    LimitExceeded,
    SosSideEffectFailed,
    ConfigInvalid,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerationFailed => "generation_failed",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::ProviderExhausted => "provider_exhausted",
            Self::ProviderRejected => "provider_rejected",
            Self::LimitExceeded => "limit_exceeded",
            Self::SosSideEffectFailed => "sos_side_effect_failed",
            Self::ConfigInvalid => "config_invalid",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal pipeline failure.
///
/// Carries the originating error for logs; end users only ever see
/// [`NathiaError::user_message`].
#[derive(Debug, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct NathiaError {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl NathiaError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the originating error
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Generic text safe to show to end users
    pub fn user_message(&self) -> &'static str {
        match self.code {
            ErrorCode::LimitExceeded => {
                "Você atingiu o limite de perguntas por agora. Tente novamente mais tarde."
            }
            _ => "Não foi possível concluir sua solicitação agora. Tente novamente em instantes.",
        }
    }
}

/// Failure of an outbound call (AI provider, Q&A provider, storage)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream call timed out")]
    Timeout,

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nathia_error_keeps_source() {
        let err = NathiaError::new(ErrorCode::GenerationFailed, "provider failed")
            .with_source(UpstreamError::Timeout);

        assert_eq!(err.to_string(), "[generation_failed] provider failed");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "upstream call timed out");
    }

    #[test]
    fn test_user_message_hides_internals() {
        let err = NathiaError::new(ErrorCode::Internal, "db pool exhausted at 10.0.0.3");
        assert!(!err.user_message().contains("10.0.0.3"));
    }

    #[test]
    fn test_validation_conversion() {
        let err: Error = ValidationError::EmptyText.into();
        assert!(err.is_validation());
    }

    #[test]
    fn test_error_codes_serialize_as_wire_names() {
        for code in [
            ErrorCode::GenerationFailed,
            ErrorCode::ProviderUnavailable,
            ErrorCode::ProviderExhausted,
            ErrorCode::ProviderRejected,
            ErrorCode::LimitExceeded,
            ErrorCode::SosSideEffectFailed,
            ErrorCode::ConfigInvalid,
            ErrorCode::Internal,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }
}
