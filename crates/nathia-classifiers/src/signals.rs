//! Aggregated signal extraction
//!
//! [`SignalClassifier`] is the seam between text analysis and the policy
//! layer. Triage and moderation only ever see a [`SignalReport`], so a
//! model-based classifier can replace [`LexiconClassifier`] without
//! changing their contracts.

use crate::classifier::Dimension;
use crate::concerns::{ConcernDetector, ConcernHit};
use crate::keyword::{KeywordClassifier, ScoreWeight};
use crate::lexicon::{fold, Lexicon};
use crate::sentiment::SentimentClassifier;
use async_trait::async_trait;
use nathia_core::{ConfigHandle, Result, SentimentAnalysis, ValidationError};
use std::time::Instant;
use tracing::debug;

/// Everything the classifier extracted from one text
#[derive(Debug, Clone)]
pub struct SignalReport {
    /// High-risk keywords found, in list order
    pub high_risk: Vec<String>,
    /// Watch keywords found, in list order
    pub watch: Vec<String>,
    pub judgement: Vec<String>,
    pub toxicity: Vec<String>,
    pub judgement_score: f64,
    pub toxicity_score: f64,
    pub sentiment: SentimentAnalysis,
    pub concerns: Vec<ConcernHit>,
}

#[async_trait]
pub trait SignalClassifier: Send + Sync {
    /// Extract signals from `text`.
    ///
    /// Fails only with a validation error for empty or overlong input.
    async fn analyze(&self, text: &str) -> Result<SignalReport>;

    fn name(&self) -> &str;
}

/// Reject whitespace-only text and text longer than `max_chars` characters
pub fn validate_text(text: &str, max_chars: usize) -> std::result::Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    let actual = text.chars().count();
    if actual > max_chars {
        return Err(ValidationError::TextTooLong {
            max: max_chars,
            actual,
        });
    }
    Ok(())
}

/// Risk confidence from hit counts.
///
/// Computed in hundredths so that thresholds compare exactly:
/// high-risk hits start at `baseline` (never below 0.6) and add 0.15 per
/// extra hit up to 0.9;
/// watch hits start at 0.4 and add 0.1 per extra hit up to 0.7.
pub fn risk_confidence(high_risk_hits: usize, watch_hits: usize, baseline: f64) -> f64 {
    let hundredths: u32 = if high_risk_hits >= 1 {
        let base = ((baseline * 100.0).round() as u32).clamp(60, 90);
        (base + 15 * (high_risk_hits as u32 - 1)).min(90)
    } else if watch_hits >= 1 {
        (40 + 10 * (watch_hits as u32 - 1)).min(70)
    } else {
        10
    };
    f64::from(hundredths) / 100.0
}

/// Keyword and heuristic classifier over a [`Lexicon`]
pub struct LexiconClassifier {
    high_risk: KeywordClassifier,
    watch: KeywordClassifier,
    judgement: KeywordClassifier,
    toxicity: KeywordClassifier,
    sentiment: SentimentClassifier,
    concerns: ConcernDetector,
    config: ConfigHandle,
}

impl LexiconClassifier {
    pub fn new(lexicon: &Lexicon, config: ConfigHandle) -> Result<Self> {
        Ok(Self {
            high_risk: KeywordClassifier::new(
                Dimension::RiskHigh,
                &lexicon.high_risk,
                ScoreWeight::BINARY,
            )?,
            watch: KeywordClassifier::new(Dimension::RiskWatch, &lexicon.watch, ScoreWeight::BINARY)?,
            judgement: KeywordClassifier::new(
                Dimension::Judgement,
                &lexicon.judgement,
                ScoreWeight::JUDGEMENT,
            )?,
            toxicity: KeywordClassifier::new(
                Dimension::Toxicity,
                &lexicon.toxicity,
                ScoreWeight::TOXICITY,
            )?,
            sentiment: SentimentClassifier::from_lexicon(lexicon)?,
            concerns: ConcernDetector::new()?,
            config,
        })
    }

    /// Classifier over the built-in pt-BR lexicon
    pub fn with_defaults(config: ConfigHandle) -> Result<Self> {
        Self::new(&Lexicon::default(), config)
    }
}

#[async_trait]
impl SignalClassifier for LexiconClassifier {
    async fn analyze(&self, text: &str) -> Result<SignalReport> {
        let start = Instant::now();
        let limits = self.config.current().limits;
        validate_text(text, limits.max_chars)?;

        let folded = fold(text);
        let judgement = self.judgement.matches_folded(&folded);
        let toxicity = self.toxicity.matches_folded(&folded);

        let report = SignalReport {
            high_risk: self.high_risk.matches_folded(&folded),
            watch: self.watch.matches_folded(&folded),
            judgement_score: self.judgement.score(judgement.len()),
            toxicity_score: self.toxicity.score(toxicity.len()),
            judgement,
            toxicity,
            sentiment: self.sentiment.analyze_folded(text, &folded),
            concerns: self.concerns.detect_folded(text, &folded, &limits),
        };

        debug!(
            high_risk = report.high_risk.len(),
            watch = report.watch.len(),
            judgement = report.judgement_score,
            toxicity = report.toxicity_score,
            latency_us = start.elapsed().as_micros() as u64,
            "Signals extracted"
        );

        Ok(report)
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}
