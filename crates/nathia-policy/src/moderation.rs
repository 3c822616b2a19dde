//! Community moderation
//!
//! [`ModerationEngine::analyze`] scores a post and explains the scores.
//! [`decide`] turns an analysis into a publishing decision. The two are
//! separate: `is_safe` answers "does this breach a threshold", the decision
//! answers "does a human need to look".

use nathia_classifiers::{fold, ConcernHit, ConcernKind, SignalClassifier, SignalReport};
use nathia_core::{ConfigHandle, ModerationAnalysis, ModerationDecision, Result, Thresholds};
use regex::Regex;
use std::fmt::Write as _;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info};

/// Scores at or above this are never rewritten automatically
pub const REWRITE_CEILING: f64 = 0.8;

/// Returned instead of a rewrite for severe content
pub const DO_NOT_PUBLISH: &str = "Este conteúdo não deve ser publicado. Ele contém linguagem \
ofensiva ou julgadora grave e foi encaminhado para a equipe de moderação.";

const SOFTENERS: &[(&str, &str)] = &[
    (r"(?i)\bvoc[eê] deveria\b", "talvez você possa"),
    (r"(?i)\bvoc[eê] (tem que|precisa)\b", "vale considerar"),
    (r"(?i)\bm[ãa]es de verdade\b", "muitas mães"),
    (r"(?i)\bm[ãa]e de verdade\b", "uma mãe"),
    (r"(?i)\btoda m[ãa]e\b", "cada mãe"),
    (r"(?i)\bn[ãa]o deveria\b", "talvez não seja preciso"),
    (r"(?i)\bno meu tempo\b", "na minha experiência"),
];

pub struct ModerationEngine {
    classifier: Arc<dyn SignalClassifier>,
    config: ConfigHandle,
    softeners: Vec<(Regex, &'static str)>,
    spaces: Regex,
}

impl ModerationEngine {
    pub fn new(classifier: Arc<dyn SignalClassifier>, config: ConfigHandle) -> Result<Self> {
        let mut softeners = Vec::with_capacity(SOFTENERS.len());
        for (pattern, replacement) in SOFTENERS {
            let regex = Regex::new(pattern).map_err(|e| {
                nathia_core::Error::internal(format!("invalid softener pattern: {}", e))
            })?;
            softeners.push((regex, *replacement));
        }
        let spaces = Regex::new(r"\s*(,)(?:\s*,)*|\s+([.!?])|\s{2,}")
            .map_err(|e| nathia_core::Error::internal(format!("invalid spacing pattern: {}", e)))?;

        Ok(Self {
            classifier,
            config,
            softeners,
            spaces,
        })
    }

    /// Score and explain a post; fails only on invalid input
    pub async fn analyze(&self, text: &str) -> Result<ModerationAnalysis> {
        let report = self.classifier.analyze(text).await?;
        let thresholds = self.config.current().thresholds;
        let analysis = self.analyze_report(text, &report, &thresholds);

        debug!(
            judgement = analysis.judgement_score,
            toxicity = analysis.toxicity_score,
            is_safe = analysis.is_safe,
            "Moderation analysis complete"
        );

        Ok(analysis)
    }

    /// Build the analysis for an already-extracted report
    pub fn analyze_report(
        &self,
        text: &str,
        report: &SignalReport,
        thresholds: &Thresholds,
    ) -> ModerationAnalysis {
        let judgement_score = report.judgement_score;
        let toxicity_score = report.toxicity_score;
        let is_safe = is_safe(judgement_score, toxicity_score, thresholds);

        let mut concerns = Vec::new();
        if !report.judgement.is_empty() {
            concerns.push("judgemental_language".to_string());
        }
        if !report.toxicity.is_empty() {
            concerns.push("toxic_language".to_string());
        }
        concerns.extend(report.concerns.iter().map(|c| c.kind.as_str().to_string()));

        let suggested_rewrite = if is_safe {
            None
        } else if judgement_score < REWRITE_CEILING && toxicity_score < REWRITE_CEILING {
            Some(self.soften(text, &report.toxicity))
        } else {
            Some(DO_NOT_PUBLISH.to_string())
        };

        ModerationAnalysis {
            judgement_score,
            toxicity_score,
            is_safe,
            concerns,
            rationale: rationale(report, thresholds, is_safe, suggested_rewrite.as_deref()),
            suggested_rewrite,
        }
    }

    /// Decide under the active thresholds and count the decision
    pub fn decide(&self, analysis: &ModerationAnalysis) -> ModerationDecision {
        let decision = decide(analysis, &self.config.current().thresholds);
        metrics::counter!("nathia_moderation_decisions_total", "decision" => decision.as_str())
            .increment(1);
        if decision != ModerationDecision::Approve {
            info!(
                decision = %decision,
                judgement = analysis.judgement_score,
                toxicity = analysis.toxicity_score,
                "Post held by moderation"
            );
        }
        decision
    }

    /// Analyze and decide in one step
    pub async fn moderate(&self, text: &str) -> Result<(ModerationAnalysis, ModerationDecision)> {
        let analysis = self.analyze(text).await?;
        let decision = self.decide(&analysis);
        Ok((analysis, decision))
    }

    /// Rule-based softening: rephrase prescriptive openers, drop insults
    fn soften(&self, text: &str, toxic: &[String]) -> String {
        let mut out = text.to_string();
        for (regex, replacement) in &self.softeners {
            out = regex.replace_all(&out, *replacement).into_owned();
        }
        let out = remove_spans(&out, &offending_words(&out, toxic));
        // Tidy the gaps left behind by removed words
        let out = self.spaces.replace_all(&out, |caps: &regex::Captures<'_>| {
            match caps.get(1).or_else(|| caps.get(2)) {
                Some(punct) => punct.as_str().to_string(),
                None => " ".to_string(),
            }
        });
        out.trim().trim_start_matches([',', ' ']).to_string()
    }
}


/// Byte ranges of every whole word in `text` that contains one of
/// `keywords`, matched the way the classifier matches: case and accents
/// folded, inflections included
fn offending_words(text: &str, keywords: &[String]) -> Vec<Range<usize>> {
    // Folded text plus, for each folded byte, the source char's byte offset
    let mut folded = String::with_capacity(text.len());
    let mut origin = Vec::with_capacity(text.len());
    for (idx, ch) in text.char_indices() {
        let piece = fold(ch.encode_utf8(&mut [0; 4]));
        origin.extend(std::iter::repeat(idx).take(piece.len()));
        folded.push_str(&piece);
    }

    let mut spans = Vec::new();
    for keyword in keywords.iter().map(|k| fold(k)).filter(|k| !k.is_empty()) {
        for (at, matched) in folded.match_indices(keyword.as_str()) {
            let first = origin[at];
            let last = origin[at + matched.len() - 1];
            let end = last + text[last..].chars().next().map_or(0, char::len_utf8);
            spans.push(word_bounds(text, first, end));
        }
    }

    spans.sort_by_key(|r| r.start);
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(prev) if span.start <= prev.end => prev.end = prev.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}

/// Widen `start..end` to the enclosing word boundaries
fn word_bounds(text: &str, start: usize, end: usize) -> Range<usize> {
    let start = text[..start]
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric())
        .last()
        .map_or(start, |(i, _)| i);
    let end = text[end..]
        .char_indices()
        .find(|(_, c)| !c.is_alphanumeric())
        .map_or(text.len(), |(i, _)| end + i);
    start..end
}

/// `text` without the given sorted, disjoint ranges
fn remove_spans(text: &str, spans: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&text[cursor..span.start]);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Both scores strictly under their own threshold
pub fn is_safe(judgement_score: f64, toxicity_score: f64, thresholds: &Thresholds) -> bool {
    judgement_score < thresholds.judgement && toxicity_score < thresholds.toxicity
}

/// Reject if either score reaches `auto_reject`, approve if both are below
/// `auto_approve`, otherwise send to human review
pub fn decide(analysis: &ModerationAnalysis, thresholds: &Thresholds) -> ModerationDecision {
    let (j, t) = (analysis.judgement_score, analysis.toxicity_score);
    if j >= thresholds.auto_reject || t >= thresholds.auto_reject {
        ModerationDecision::Reject
    } else if j < thresholds.auto_approve && t < thresholds.auto_approve {
        ModerationDecision::Approve
    } else {
        ModerationDecision::Review
    }
}

fn concern_label(hit: &ConcernHit) -> String {
    let label = match hit.kind {
        ConcernKind::TonePolicing => "Tom que minimiza os sentimentos de outra mãe",
        ConcernKind::MaternalComparison => "Comparação entre mães",
        ConcernKind::Alarmist => "Afirmação alarmista sobre saúde",
        ConcernKind::EmojiOveruse => "Excesso de emojis",
        ConcernKind::LongSentences => "Frases muito longas, difíceis de ler",
    };
    format!("- {} ({})", label, hit.evidence)
}

fn quoted(words: &[String]) -> String {
    words
        .iter()
        .map(|w| format!("\"{}\"", w))
        .collect::<Vec<_>>()
        .join(", ")
}

fn rationale(
    report: &SignalReport,
    thresholds: &Thresholds,
    is_safe: bool,
    rewrite: Option<&str>,
) -> String {
    let mut text = String::new();

    let _ = write!(
        text,
        "Pontuação de julgamento: {:.2} (limite {:.2}). Pontuação de toxicidade: {:.2} (limite {:.2}).",
        report.judgement_score, thresholds.judgement, report.toxicity_score, thresholds.toxicity
    );

    text.push_str("\n\n");
    if is_safe {
        text.push_str("O texto está dentro das diretrizes de acolhimento da comunidade.");
    } else {
        text.push_str("O texto pode soar julgador ou ofensivo para outras mães.");
    }
    if !report.judgement.is_empty() {
        let _ = write!(text, " Expressões de julgamento: {}.", quoted(&report.judgement));
    }
    if !report.toxicity.is_empty() {
        let _ = write!(text, " Expressões ofensivas: {}.", quoted(&report.toxicity));
    }

    if !report.concerns.is_empty() {
        text.push_str("\n\nOutros pontos de atenção:\n");
        let lines: Vec<String> = report.concerns.iter().map(concern_label).collect();
        text.push_str(&lines.join("\n"));
    }

    match rewrite {
        Some(DO_NOT_PUBLISH) => {
            text.push_str(
                "\n\nA gravidade do conteúdo impede uma sugestão automática de reescrita.",
            );
        }
        Some(_) => {
            text.push_str(
                "\n\nSugerimos reformular a mensagem com um tom acolhedor, falando da sua \
                 experiência em vez de dizer o que a outra mãe deve fazer.",
            );
        }
        None => {}
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use nathia_classifiers::LexiconClassifier;

    fn engine() -> ModerationEngine {
        let config = ConfigHandle::default();
        let classifier = Arc::new(LexiconClassifier::with_defaults(config.clone()).unwrap());
        ModerationEngine::new(classifier, config).unwrap()
    }

    fn analysis(judgement: f64, toxicity: f64) -> ModerationAnalysis {
        ModerationAnalysis {
            judgement_score: judgement,
            toxicity_score: toxicity,
            is_safe: is_safe(judgement, toxicity, &Thresholds::default()),
            concerns: Vec::new(),
            suggested_rewrite: None,
            rationale: String::new(),
        }
    }

    #[test]
    fn test_decide_bands() {
        let t = Thresholds::default();
        assert_eq!(decide(&analysis(0.0, 0.1), &t), ModerationDecision::Approve);
        assert_eq!(decide(&analysis(0.2, 0.0), &t), ModerationDecision::Review);
        assert_eq!(decide(&analysis(0.6, 0.35), &t), ModerationDecision::Review);
        assert_eq!(decide(&analysis(0.8, 0.0), &t), ModerationDecision::Reject);
        assert_eq!(decide(&analysis(0.0, 1.0), &t), ModerationDecision::Reject);
    }

    #[test]
    fn test_is_safe_uses_independent_thresholds() {
        let t = Thresholds::default();
        assert!(is_safe(0.49, 0.49, &t));
        assert!(!is_safe(0.5, 0.0, &t));
        assert!(!is_safe(0.0, 0.5, &t));
    }

    #[tokio::test]
    async fn test_safe_text_has_no_rewrite() {
        let analysis = engine().analyze("Que lindo seu bebê, parabéns!").await.unwrap();
        assert!(analysis.is_safe);
        assert!(analysis.suggested_rewrite.is_none());
        assert!(analysis.concerns.is_empty());
        assert!(analysis.rationale.contains("dentro das diretrizes"));
    }

    #[tokio::test]
    async fn test_judgemental_text_rewritten() {
        let engine = engine();
        let analysis = engine
            .analyze("Você DEVERIA amamentar, mães de verdade fazem isso")
            .await
            .unwrap();

        assert!(analysis.judgement_score > 0.5);
        assert!(!analysis.is_safe);
        assert_eq!(
            analysis.suggested_rewrite.as_deref(),
            Some("talvez você possa amamentar, muitas mães fazem isso")
        );
        assert!(analysis.concerns.contains(&"judgemental_language".to_string()));
        assert!(analysis.concerns.contains(&"maternal_comparison".to_string()));
        assert_ne!(engine.decide(&analysis), ModerationDecision::Approve);

        // Multi-paragraph explanation
        assert!(analysis.rationale.split("\n\n").count() >= 3);
    }

    #[tokio::test]
    async fn test_toxic_words_removed_from_rewrite() {
        let analysis = engine().analyze("Sua idiota, burra, que absurdo").await.unwrap();

        assert_eq!(analysis.toxicity_score, 0.7);
        assert_eq!(analysis.suggested_rewrite.as_deref(), Some("Sua, que absurdo"));
    }

    #[tokio::test]
    async fn test_inflected_and_unaccented_insults_removed() {
        let engine = engine();

        let analysis = engine.analyze("Vocês são idiotas e burras").await.unwrap();
        assert!(!analysis.is_safe);
        let rewrite = analysis.suggested_rewrite.unwrap();
        assert!(!rewrite.contains("idiota"));
        assert!(!rewrite.contains("burra"));
        assert!(rewrite.starts_with("Vocês são"));

        let analysis = engine.analyze("Voce e uma INUTIL e estupida, sério").await.unwrap();
        let rewrite = analysis.suggested_rewrite.unwrap();
        assert!(!rewrite.to_lowercase().contains("inutil"));
        assert!(!rewrite.contains("estupida"));
        assert!(rewrite.contains("sério"));
    }

    #[test]
    fn test_offending_words_cover_whole_tokens() {
        let text = "Ô IDIOTÃS, cala a boca já";
        let keywords = vec!["idiota".to_string(), "cala a boca".to_string()];
        let spans = offending_words(text, &keywords);

        assert_eq!(spans.len(), 2);
        assert_eq!(&text[spans[0].clone()], "IDIOTÃS");
        assert_eq!(&text[spans[1].clone()], "cala a boca");
        assert_eq!(remove_spans(text, &spans), "Ô ,  já");
    }

    #[tokio::test]
    async fn test_severe_text_not_rewritten() {
        let engine = engine();
        let analysis = engine
            .analyze("Sua idiota, burra, inútil, cala a boca")
            .await
            .unwrap();

        assert!(analysis.toxicity_score >= REWRITE_CEILING);
        assert_eq!(analysis.suggested_rewrite.as_deref(), Some(DO_NOT_PUBLISH));
        assert_eq!(engine.decide(&analysis), ModerationDecision::Reject);
    }

    #[tokio::test]
    async fn test_empty_text_is_validation_error() {
        let err = engine().analyze("").await.unwrap_err();
        assert!(err.is_validation());
    }
}
