//! Server configuration

use anyhow::Context;
use nathia_chat::ProviderConfig;
use nathia_core::{NathiaConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything the server needs at startup.
///
/// Only the `safety` section is hot-reloadable; provider endpoints, retry
/// and circuit tuning are fixed for the life of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Thresholds, limits, contacts and resilience tuning
    pub safety: NathiaConfig,

    /// Generative AI provider
    pub generator: ProviderConfig,

    /// Q&A provider; `/api/qa` answers 503 without one
    pub qa: Option<ProviderConfig>,

    /// Accept plain-HTTP and loopback provider endpoints
    pub development: bool,

    /// JSON-lines mirror of the audit trail
    pub audit_path: Option<PathBuf>,

    /// Replacement keyword lexicon
    pub lexicon_path: Option<PathBuf>,

    /// Request body limit
    pub max_body_bytes: usize,

    /// Decoded size limit for message attachments
    pub max_attachment_bytes: usize,

    /// Jitter ratio applied to the API retry policy
    pub retry_jitter: f64,

    /// Stored chat messages kept per user; older ones are dropped
    pub max_history_per_user: usize,

    /// Audit events kept in memory
    pub audit_retention: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            safety: NathiaConfig::default(),
            generator: ProviderConfig::default(),
            qa: None,
            development: false,
            audit_path: None,
            lexicon_path: None,
            max_body_bytes: 256 * 1024,
            max_attachment_bytes: 5 * 1024 * 1024,
            retry_jitter: 0.2,
            max_history_per_user: 50,
            audit_retention: 10_000,
        }
    }
}

/// Values taken from the command line or environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub generator_endpoint: Option<String>,
    pub generator_api_key: Option<String>,
    pub qa_endpoint: Option<String>,
    pub qa_api_key: Option<String>,
    pub audit_path: Option<PathBuf>,
    pub development: bool,
}

impl ServerConfig {
    /// Load from `path` when it exists, defaults otherwise, then apply overrides
    pub fn load(path: &Path, overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        if let Some(endpoint) = &overrides.generator_endpoint {
            config.generator.endpoint = endpoint.clone();
        }
        if let Some(key) = &overrides.generator_api_key {
            config.generator.api_key = Some(key.clone());
        }
        if let Some(endpoint) = &overrides.qa_endpoint {
            config.qa.get_or_insert_with(ProviderConfig::default).endpoint = endpoint.clone();
        }
        if let (Some(key), Some(qa)) = (&overrides.qa_api_key, config.qa.as_mut()) {
            qa.api_key = Some(key.clone());
        }
        if let Some(audit_path) = &overrides.audit_path {
            config.audit_path = Some(audit_path.clone());
        }
        config.development |= overrides.development;

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.safety.validate()?;
        if !(0.0..=1.0).contains(&self.retry_jitter) {
            anyhow::bail!("retry_jitter must lie in [0, 1], got {}", self.retry_jitter);
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be positive");
        }
        if self.max_history_per_user == 0 || self.audit_retention == 0 {
            anyhow::bail!("max_history_per_user and audit_retention must be positive");
        }
        Ok(())
    }

    /// API retry policy with the configured jitter
    pub fn api_retry(&self) -> RetryPolicy {
        self.safety.retry.api.with_jitter(self.retry_jitter)
    }
}
