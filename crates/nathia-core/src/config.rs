//! Configuration for the NAT-IA safety core
//!
//! [`NathiaConfig`] is immutable once built. Components read it through a
//! [`ConfigHandle`], which swaps the whole struct on reload so readers
//! never observe a half-applied update.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::circuit::CircuitBreakerConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::types::EmergencyContact;

/// Tolerance for the recommendation weight sum
const WEIGHT_SUM_TOLERANCE: f32 = 0.01;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NathiaConfig {
    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub limits: TextLimits,

    #[serde(default)]
    pub retry: RetryPolicies,

    #[serde(default)]
    pub circuit: CircuitBreakerConfig,

    #[serde(default)]
    pub recommendation_weights: RecommendationWeights,

    /// Reports after which a community post is hidden
    #[serde(default = "default_report_hide_threshold")]
    pub report_hide_threshold: u32,

    /// History turns included in the generation context
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Contacts returned by the SOS protocol
    #[serde(default = "EmergencyContact::defaults")]
    pub emergency_contacts: Vec<EmergencyContact>,

    /// Bound on each SOS side effect (audit record, notification)
    #[serde(default = "default_sos_side_effect_timeout_ms")]
    pub sos_side_effect_timeout_ms: u64,
}

impl Default for NathiaConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            limits: TextLimits::default(),
            retry: RetryPolicies::default(),
            circuit: CircuitBreakerConfig::default(),
            recommendation_weights: RecommendationWeights::default(),
            report_hide_threshold: default_report_hide_threshold(),
            history_turns: default_history_turns(),
            emergency_contacts: EmergencyContact::defaults(),
            sos_side_effect_timeout_ms: default_sos_side_effect_timeout_ms(),
        }
    }
}

impl NathiaConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Reject out-of-range thresholds and inconsistent tuning
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        self.recommendation_weights.validate()?;
        self.retry.api.validate().map_err(|e| Error::config(format!("retry.api: {}", e)))?;
        self.retry
            .upload
            .validate()
            .map_err(|e| Error::config(format!("retry.upload: {}", e)))?;
        self.circuit.validate().map_err(|e| Error::config(format!("circuit: {}", e)))?;

        if self.limits.max_chars == 0 {
            return Err(Error::config("limits.max_chars must be positive"));
        }
        if self.report_hide_threshold == 0 {
            return Err(Error::config("report_hide_threshold must be positive"));
        }
        if self.emergency_contacts.is_empty() {
            return Err(Error::config("emergency_contacts must not be empty"));
        }
        if self.sos_side_effect_timeout_ms == 0 {
            return Err(Error::config("sos_side_effect_timeout_ms must be positive"));
        }
        Ok(())
    }
}

/// Decision thresholds, each in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Confidence assigned to a single high-risk match
    pub risk: f64,
    /// Watch confidence above which a human must review
    pub observation: f64,
    /// Judgement score at or above which text is unsafe
    pub judgement: f64,
    /// Toxicity score at or above which text is unsafe
    pub toxicity: f64,
    /// Both scores below this: auto-approve
    pub auto_approve: f64,
    /// Either score at or above this: auto-reject
    pub auto_reject: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            risk: 0.6,
            observation: 0.6,
            judgement: 0.5,
            toxicity: 0.5,
            auto_approve: 0.2,
            auto_reject: 0.8,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("risk", self.risk),
            ("observation", self.observation),
            ("judgement", self.judgement),
            ("toxicity", self.toxicity),
            ("auto_approve", self.auto_approve),
            ("auto_reject", self.auto_reject),
        ];
        for (name, value) in named {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::config(format!(
                    "thresholds.{} must lie in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.auto_approve > self.auto_reject {
            return Err(Error::config(format!(
                "thresholds.auto_approve ({}) exceeds auto_reject ({})",
                self.auto_approve, self.auto_reject
            )));
        }
        Ok(())
    }
}

/// Input size limits and heuristic bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextLimits {
    /// Maximum characters accepted by the classifier
    pub max_chars: usize,
    /// Emoji count above which a post is flagged
    pub max_emojis: usize,
    /// Word count above which a sentence is flagged
    pub long_sentence_words: usize,
}

impl Default for TextLimits {
    fn default() -> Self {
        Self {
            max_chars: 5_000,
            max_emojis: 5,
            long_sentence_words: 40,
        }
    }
}

/// Named retry policies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicies {
    pub api: RetryPolicy,
    pub upload: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            api: RetryPolicy::api_call(),
            upload: RetryPolicy::upload(),
        }
    }
}

/// Weighting factors for content recommendations; must sum to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationWeights {
    pub relevance: f32,
    pub recency: f32,
    pub engagement: f32,
    pub personalization: f32,
}

impl Default for RecommendationWeights {
    fn default() -> Self {
        Self {
            relevance: 0.4,
            recency: 0.2,
            engagement: 0.2,
            personalization: 0.2,
        }
    }
}

/// Normalised (0-1) signals for one content item
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSignals {
    pub relevance: f32,
    pub recency: f32,
    pub engagement: f32,
    pub personalization: f32,
}

impl RecommendationWeights {
    pub fn sum(&self) -> f32 {
        self.relevance + self.recency + self.engagement + self.personalization
    }

    pub fn validate(&self) -> Result<()> {
        let weights = [self.relevance, self.recency, self.engagement, self.personalization];
        if weights.iter().any(|w| !(0.0..=1.0).contains(w)) {
            return Err(Error::config("recommendation weights must lie in [0, 1]"));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::config(format!(
                "recommendation weights must sum to 1.0 (±{}), got {:.3}",
                WEIGHT_SUM_TOLERANCE, sum
            )));
        }
        Ok(())
    }

    /// Weighted recommendation score for one item
    pub fn score(&self, signals: &ContentSignals) -> f32 {
        self.relevance * signals.relevance
            + self.recency * signals.recency
            + self.engagement * signals.engagement
            + self.personalization * signals.personalization
    }
}

fn default_report_hide_threshold() -> u32 {
    5
}

fn default_history_turns() -> usize {
    3
}

fn default_sos_side_effect_timeout_ms() -> u64 {
    5_000
}

/// Shared, atomically swappable view of the active configuration
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<NathiaConfig>>>,
}

impl ConfigHandle {
    /// Wrap a configuration after validating it
    pub fn new(config: NathiaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        })
    }

    /// The configuration in effect right now
    pub fn current(&self) -> Arc<NathiaConfig> {
        self.inner.read().clone()
    }

    /// Validate and install a new configuration as a whole.
    ///
    /// On error the previous configuration stays active.
    pub fn reload(&self, config: NathiaConfig) -> Result<()> {
        config.validate()?;
        *self.inner.write() = Arc::new(config);
        info!("Configuration reloaded");
        Ok(())
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(NathiaConfig::default()))),
        }
    }
}
