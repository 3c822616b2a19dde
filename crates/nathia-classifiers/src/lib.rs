//! NAT-IA Classifiers
//!
//! Keyword and heuristic classifiers feeding risk triage and moderation.
//!
//! Every dimension is a plain substring match over case- and accent-folded
//! text against a configured [`Lexicon`]:
//! - risk-high and risk-watch keywords (triage)
//! - judgement and toxicity keywords (moderation)
//! - positive/negative emotion words (sentiment valence)
//!
//! Regex heuristics add moderation concerns (tone policing, maternal
//! comparison, alarmism, emoji overuse, long sentences).
//!
//! [`SignalClassifier`] is the seam for swapping in a model-based
//! implementation.

pub mod classifier;
pub mod concerns;
pub mod keyword;
pub mod lexicon;
pub mod sentiment;
pub mod signals;

pub use classifier::{ClassificationResult, Classifier, Dimension};
pub use concerns::{ConcernDetector, ConcernHit, ConcernKind};
pub use keyword::{KeywordClassifier, ScoreWeight};
pub use lexicon::{fold, Lexicon};
pub use sentiment::SentimentClassifier;
pub use signals::{risk_confidence, validate_text, LexiconClassifier, SignalClassifier, SignalReport};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{ClassificationResult, Classifier};
    pub use crate::keyword::KeywordClassifier;
    pub use crate::lexicon::Lexicon;
    pub use crate::sentiment::SentimentClassifier;
    pub use crate::signals::{LexiconClassifier, SignalClassifier, SignalReport};
}
