//! Classifier trait and common types

use async_trait::async_trait;
use nathia_core::Result;
use std::fmt;

/// Trait for single-dimension classifiers
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the given text
    async fn classify(&self, text: &str) -> Result<ClassificationResult>;

    /// Get the classifier name
    fn name(&self) -> &str;

    /// The dimension this classifier scores
    fn dimension(&self) -> Dimension;
}

/// Independent signal dimensions extracted from a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    RiskHigh,
    RiskWatch,
    Judgement,
    Toxicity,
    Sentiment,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RiskHigh => "risk_high",
            Self::RiskWatch => "risk_watch",
            Self::Judgement => "judgement",
            Self::Toxicity => "toxicity",
            Self::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classification
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    /// Classification label
    pub label: String,

    /// Score (0.0-1.0)
    pub score: f64,

    /// Matched keywords in configured-list order
    pub matches: Vec<String>,

    /// Latency in microseconds
    pub latency_us: u64,
}
