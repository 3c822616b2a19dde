//! Keyword classifier
//!
//! One Aho-Corasick automaton per dimension, built over folded keywords.
//! Overlapping search means every configured keyword present in the text
//! is found, even when keywords share characters.

use crate::classifier::{ClassificationResult, Classifier, Dimension};
use crate::lexicon::fold;
use aho_corasick::{AhoCorasick, MatchKind};
use nathia_core::{Error, Result};
use std::time::Instant;

/// How keyword hits translate into a score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeight {
    pub per_match: f64,
    pub cap: f64,
}

impl ScoreWeight {
    pub const JUDGEMENT: ScoreWeight = ScoreWeight {
        per_match: 0.3,
        cap: 1.0,
    };

    pub const TOXICITY: ScoreWeight = ScoreWeight {
        per_match: 0.35,
        cap: 1.0,
    };

    /// Presence-only dimensions (risk): any hit scores 1.0
    pub const BINARY: ScoreWeight = ScoreWeight {
        per_match: 1.0,
        cap: 1.0,
    };

    pub fn score(&self, hits: usize) -> f64 {
        (hits as f64 * self.per_match).min(self.cap)
    }
}

/// Substring classifier over a ranked keyword list
pub struct KeywordClassifier {
    name: String,
    dimension: Dimension,
    weight: ScoreWeight,
    keywords: Vec<String>,
    matcher: Option<AhoCorasick>,
}

impl KeywordClassifier {
    /// Build a classifier; duplicate keywords (after folding) are dropped
    pub fn new(dimension: Dimension, keywords: &[String], weight: ScoreWeight) -> Result<Self> {
        let mut kept: Vec<String> = Vec::with_capacity(keywords.len());
        let mut folded: Vec<String> = Vec::with_capacity(keywords.len());

        for keyword in keywords {
            let key = fold(keyword.trim());
            if key.is_empty() || folded.contains(&key) {
                continue;
            }
            folded.push(key);
            kept.push(keyword.trim().to_string());
        }

        let matcher = if folded.is_empty() {
            None
        } else {
            let ac = AhoCorasick::builder()
                .match_kind(MatchKind::Standard)
                .build(&folded)
                .map_err(|e| {
                    Error::classifier(format!("Failed to build {} matcher: {}", dimension, e))
                })?;
            Some(ac)
        };

        Ok(Self {
            name: dimension.as_str().to_string(),
            dimension,
            weight,
            keywords: kept,
            matcher,
        })
    }

    /// Keywords found in already-folded text, in configured-list order
    pub fn matches_folded(&self, folded: &str) -> Vec<String> {
        let Some(matcher) = &self.matcher else {
            return Vec::new();
        };

        let mut hit = vec![false; self.keywords.len()];
        for m in matcher.find_overlapping_iter(folded) {
            hit[m.pattern().as_usize()] = true;
        }

        self.keywords
            .iter()
            .zip(hit)
            .filter_map(|(keyword, hit)| hit.then(|| keyword.clone()))
            .collect()
    }

    /// Keywords found in raw text
    pub fn matches(&self, text: &str) -> Vec<String> {
        self.matches_folded(&fold(text))
    }

    pub fn score(&self, hits: usize) -> f64 {
        self.weight.score(hits)
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

#[async_trait::async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let start = Instant::now();

        let matches = self.matches(text);
        let label = if matches.is_empty() {
            "clean"
        } else {
            self.dimension.as_str()
        };

        Ok(ClassificationResult {
            label: label.to_string(),
            score: self.weight.score(matches.len()),
            matches,
            latency_us: start.elapsed().as_micros() as u64,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> Dimension {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_keyword_classifier() {
        let classifier = KeywordClassifier::new(
            Dimension::Toxicity,
            &list(&["idiota", "cala a boca"]),
            ScoreWeight::TOXICITY,
        )
        .unwrap();

        let result = classifier.classify("que texto tranquilo").await.unwrap();
        assert_eq!(result.label, "clean");
        assert_eq!(result.score, 0.0);

        let result = classifier.classify("CALA A BOCA, sua idiota").await.unwrap();
        assert_eq!(result.label, "toxicity");
        assert_eq!(result.score, 0.7);
        assert_eq!(result.matches.len(), 2);
    }

    #[test]
    fn test_matches_follow_list_order_not_text_order() {
        let classifier = KeywordClassifier::new(
            Dimension::RiskWatch,
            &list(&["sozinha", "exausta", "vazia"]),
            ScoreWeight::BINARY,
        )
        .unwrap();

        let matches = classifier.matches("me sinto vazia, exausta e sozinha");
        assert_eq!(matches, list(&["sozinha", "exausta", "vazia"]));
    }

    #[test]
    fn test_accent_and_case_insensitive() {
        let classifier = KeywordClassifier::new(
            Dimension::Judgement,
            &list(&["você deveria"]),
            ScoreWeight::JUDGEMENT,
        )
        .unwrap();

        assert_eq!(classifier.matches("VOCE DEVERIA dormir").len(), 1);
        assert_eq!(classifier.matches("Você deveria").len(), 1);
    }

    #[test]
    fn test_overlapping_keywords_all_reported() {
        let classifier = KeywordClassifier::new(
            Dimension::RiskHigh,
            &list(&["vou me matar", "me matar"]),
            ScoreWeight::BINARY,
        )
        .unwrap();

        assert_eq!(classifier.matches("acho que vou me matar").len(), 2);
    }

    #[test]
    fn test_duplicates_after_folding_dropped() {
        let classifier = KeywordClassifier::new(
            Dimension::Judgement,
            &list(&["você deveria", "voce deveria", "  "]),
            ScoreWeight::JUDGEMENT,
        )
        .unwrap();

        assert_eq!(classifier.keywords().len(), 1);
    }

    #[test]
    fn test_empty_list_never_matches() {
        let classifier = KeywordClassifier::new(Dimension::Toxicity, &[], ScoreWeight::TOXICITY).unwrap();
        assert!(classifier.matches("qualquer coisa").is_empty());
    }
}
