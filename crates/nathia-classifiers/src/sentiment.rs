//! Lexicon-based sentiment classifier
//!
//! Valence comes from the balance of positive and negative hits; the label
//! names the dominant negative bucket (sadness, anxiety, exhaustion) when
//! negatives win.

use crate::classifier::{ClassificationResult, Classifier, Dimension};
use crate::lexicon::{fold, Lexicon};
use aho_corasick::{AhoCorasick, MatchKind};
use nathia_core::{Error, Result, SentimentAnalysis, Valence};
use std::collections::BTreeSet;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Positive,
    Calm,
    Sadness,
    Anxiety,
    Exhaustion,
}

pub struct SentimentClassifier {
    name: String,
    matcher: Option<AhoCorasick>,
    entries: Vec<(Bucket, String)>,
}

impl SentimentClassifier {
    pub fn new() -> Result<Self> {
        Self::from_lexicon(&Lexicon::default())
    }

    pub fn from_lexicon(lexicon: &Lexicon) -> Result<Self> {
        let buckets = [
            (Bucket::Positive, &lexicon.positive),
            (Bucket::Calm, &lexicon.calm),
            (Bucket::Sadness, &lexicon.sadness),
            (Bucket::Anxiety, &lexicon.anxiety),
            (Bucket::Exhaustion, &lexicon.exhaustion),
        ];

        let mut entries = Vec::new();
        for (bucket, list) in buckets {
            for word in list {
                let word = fold(word.trim());
                if !word.is_empty() {
                    entries.push((bucket, word));
                }
            }
        }

        let matcher = if entries.is_empty() {
            None
        } else {
            let patterns: Vec<&str> = entries.iter().map(|(_, w)| w.as_str()).collect();
            let ac = AhoCorasick::builder()
                .match_kind(MatchKind::Standard)
                .build(patterns)
                .map_err(|e| {
                    Error::classifier(format!("Failed to build sentiment matcher: {e}"))
                })?;
            Some(ac)
        };

        Ok(Self {
            name: "sentiment".to_string(),
            matcher,
            entries,
        })
    }

    /// Sentiment of `text`; `folded` must be `fold(text)`
    pub fn analyze_folded(&self, text: &str, folded: &str) -> SentimentAnalysis {
        let mut keywords = BTreeSet::new();
        let mut counts = [0usize; 5];

        if let Some(matcher) = &self.matcher {
            let mut seen = vec![false; self.entries.len()];
            for m in matcher.find_overlapping_iter(folded) {
                let idx = m.pattern().as_usize();
                if seen[idx] {
                    continue;
                }
                seen[idx] = true;
                let (bucket, word) = &self.entries[idx];
                counts[*bucket as usize] += 1;
                keywords.insert(word.clone());
            }
        }

        let joy = counts[Bucket::Positive as usize];
        let calm = counts[Bucket::Calm as usize];
        let positive = joy + calm;
        let negative = counts[Bucket::Sadness as usize]
            + counts[Bucket::Anxiety as usize]
            + counts[Bucket::Exhaustion as usize];

        let valence = match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Valence::Positive,
            std::cmp::Ordering::Less => Valence::Negative,
            std::cmp::Ordering::Equal => Valence::Neutral,
        };

        let sentiment = match valence {
            Valence::Positive if calm > joy => "calma",
            Valence::Positive => "alegria",
            Valence::Neutral => "neutro",
            Valence::Negative => {
                let sadness = counts[Bucket::Sadness as usize];
                let anxiety = counts[Bucket::Anxiety as usize];
                let exhaustion = counts[Bucket::Exhaustion as usize];
                if sadness >= anxiety && sadness >= exhaustion {
                    "tristeza"
                } else if anxiety >= exhaustion {
                    "ansiedade"
                } else {
                    "exaustao"
                }
            }
        };

        SentimentAnalysis {
            sentiment: sentiment.to_string(),
            intensity: intensity(text, positive + negative),
            valence,
            keywords,
        }
    }

    pub fn analyze(&self, text: &str) -> SentimentAnalysis {
        self.analyze_folded(text, &fold(text))
    }
}

/// 0-10 scale: two points per emotional hit plus emphasis (exclamation
/// marks, shouted words), each emphasis source capped at two points.
fn intensity(text: &str, hits: usize) -> u8 {
    let exclamations = text.matches('!').count().min(2);
    let shouted = text
        .split_whitespace()
        .filter(|w| {
            let letters: Vec<char> = w.chars().filter(|c| c.is_alphabetic()).collect();
            letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase())
        })
        .count()
        .min(2);

    (hits * 2 + exclamations + shouted).min(10) as u8
}

#[async_trait::async_trait]
impl Classifier for SentimentClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let start = Instant::now();

        let analysis = self.analyze(text);
        let score = match analysis.valence {
            Valence::Positive => 1.0,
            Valence::Neutral => 0.5,
            Valence::Negative => 0.0,
        };

        Ok(ClassificationResult {
            label: analysis.sentiment,
            score,
            matches: analysis.keywords.into_iter().collect(),
            latency_us: start.elapsed().as_micros() as u64,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> Dimension {
        Dimension::Sentiment
    }
}
