//! Concern patterns for community posts
//!
//! Phrase patterns run over folded text. The emoji and sentence-length
//! heuristics look at the original text.

use crate::lexicon::fold;
use nathia_core::{Error, Result, TextLimits};
use regex::Regex;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcernKind {
    /// Dismissing someone's feelings ("calma", "é frescura")
    TonePolicing,
    /// Measuring a mother against others
    MaternalComparison,
    /// Fear-inducing health claims
    Alarmist,
    EmojiOveruse,
    LongSentences,
}

impl ConcernKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TonePolicing => "tone_policing",
            Self::MaternalComparison => "maternal_comparison",
            Self::Alarmist => "alarmist",
            Self::EmojiOveruse => "emoji_overuse",
            Self::LongSentences => "long_sentences",
        }
    }
}

impl fmt::Display for ConcernKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A triggered concern and the text that triggered it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConcernHit {
    pub kind: ConcernKind,
    pub evidence: String,
}

const TONE_POLICING: &str = r"\b(calma|relaxa|para de reclamar|nao e para tanto|e frescura|que drama|voce esta exagerando|exagerada)\b";
const MATERNAL_COMPARISON: &str = r"\b(maes? de verdade|toda mae|outras maes|boa mae|no meu tempo|minha mae fazia|eu consegui,? (entao )?voce)\b";
const ALARMIST: &str = r"\b(vai morrer|pode morrer|vai ficar doente|perigo de vida|muito perigoso|nunca mais vai|vai se arrepender|tragedia)\b";

pub struct ConcernDetector {
    phrases: Vec<(ConcernKind, Regex)>,
    emoji: Regex,
}

impl ConcernDetector {
    pub fn new() -> Result<Self> {
        let mut phrases = Vec::new();
        for (kind, pattern) in [
            (ConcernKind::TonePolicing, TONE_POLICING),
            (ConcernKind::MaternalComparison, MATERNAL_COMPARISON),
            (ConcernKind::Alarmist, ALARMIST),
        ] {
            let regex = Regex::new(pattern)
                .map_err(|e| Error::classifier(format!("Invalid {} pattern: {}", kind, e)))?;
            phrases.push((kind, regex));
        }

        let emoji = Regex::new(r"\p{Extended_Pictographic}")
            .map_err(|e| Error::classifier(format!("Invalid emoji pattern: {}", e)))?;

        Ok(Self { phrases, emoji })
    }

    /// Detect concerns; `folded` must be `fold(text)`
    pub fn detect_folded(&self, text: &str, folded: &str, limits: &TextLimits) -> Vec<ConcernHit> {
        let mut hits = Vec::new();

        for (kind, regex) in &self.phrases {
            if let Some(m) = regex.find(folded) {
                hits.push(ConcernHit {
                    kind: *kind,
                    evidence: m.as_str().to_string(),
                });
            }
        }

        let emojis = self.emoji.find_iter(text).count();
        if emojis > limits.max_emojis {
            hits.push(ConcernHit {
                kind: ConcernKind::EmojiOveruse,
                evidence: format!("{} emojis", emojis),
            });
        }

        let longest = text
            .split(['.', '!', '?', '\n'])
            .map(|sentence| sentence.split_whitespace().count())
            .max()
            .unwrap_or(0);
        if longest > limits.long_sentence_words {
            hits.push(ConcernHit {
                kind: ConcernKind::LongSentences,
                evidence: format!("{} words in one sentence", longest),
            });
        }

        hits
    }

    pub fn detect(&self, text: &str, limits: &TextLimits) -> Vec<ConcernHit> {
        self.detect_folded(text, &fold(text), limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(hits: &[ConcernHit]) -> Vec<ConcernKind> {
        hits.iter().map(|h| h.kind).collect()
    }

    #[test]
    fn test_phrase_concerns() {
        let detector = ConcernDetector::new().unwrap();
        let limits = TextLimits::default();

        let hits = detector.detect("Calma, é frescura. No meu tempo ninguém reclamava", &limits);
        assert_eq!(
            kinds(&hits),
            vec![ConcernKind::TonePolicing, ConcernKind::MaternalComparison]
        );

        let hits = detector.detect("Se não vacinar o bebê VAI MORRER", &limits);
        assert_eq!(kinds(&hits), vec![ConcernKind::Alarmist]);
        assert_eq!(hits[0].evidence, "vai morrer");
    }

    #[test]
    fn test_emoji_limit() {
        let detector = ConcernDetector::new().unwrap();
        let limits = TextLimits::default();

        assert!(detector.detect("amei 😍😍😍😍😍", &limits).is_empty());
        let hits = detector.detect("amei 😍😍😍😍😍😍", &limits);
        assert_eq!(kinds(&hits), vec![ConcernKind::EmojiOveruse]);
    }

    #[test]
    fn test_long_sentence() {
        let detector = ConcernDetector::new().unwrap();
        let limits = TextLimits::default();

        let forty = vec!["palavra"; 40].join(" ");
        assert!(detector.detect(&forty, &limits).is_empty());

        let forty_one = format!("{} extra. Curta.", forty);
        let hits = detector.detect(&forty_one, &limits);
        assert_eq!(kinds(&hits), vec![ConcernKind::LongSentences]);
    }

    #[test]
    fn test_clean_text() {
        let detector = ConcernDetector::new().unwrap();
        let hits = detector.detect("Que lindo seu bebê, parabéns!", &TextLimits::default());
        assert!(hits.is_empty());
    }
}
