//! End-to-end tests for the aggregated lexicon classifier

use nathia_classifiers::{
    risk_confidence, ConcernKind, Lexicon, LexiconClassifier, SignalClassifier,
};
use nathia_core::{ConfigHandle, NathiaConfig, Valence};
use proptest::prelude::*;

fn classifier() -> LexiconClassifier {
    LexiconClassifier::with_defaults(ConfigHandle::default()).unwrap()
}

#[tokio::test]
async fn test_high_risk_phrase() {
    let report = classifier().analyze("Não aguento mais, quero morrer").await.unwrap();

    assert_eq!(report.high_risk, vec!["quero morrer".to_string()]);
    assert_eq!(report.watch, vec!["não aguento".to_string()]);
    assert_eq!(report.sentiment.valence, Valence::Negative);
}

#[tokio::test]
async fn test_judgemental_post() {
    let report = classifier()
        .analyze("Você DEVERIA amamentar, mães de verdade fazem isso")
        .await
        .unwrap();

    assert_eq!(
        report.judgement,
        vec!["você deveria".to_string(), "mães de verdade".to_string()]
    );
    assert!(report.judgement_score > 0.5);
    assert_eq!(report.toxicity_score, 0.0);
    assert!(report
        .concerns
        .iter()
        .any(|c| c.kind == ConcernKind::MaternalComparison));
}

#[tokio::test]
async fn test_custom_lexicon() {
    let lexicon = Lexicon::from_yaml("toxicity:\n  - \"chata\"\n").unwrap();
    let classifier = LexiconClassifier::new(&lexicon, ConfigHandle::default()).unwrap();

    let report = classifier.analyze("que CHATA você é, idiota").await.unwrap();
    // Default toxicity list was replaced
    assert_eq!(report.toxicity, vec!["chata".to_string()]);
}

#[tokio::test]
async fn test_limits_follow_config_reload() {
    let handle = ConfigHandle::default();
    let classifier = LexiconClassifier::with_defaults(handle.clone()).unwrap();
    let text = "a".repeat(200);

    assert!(classifier.analyze(&text).await.is_ok());

    let mut config = NathiaConfig::default();
    config.limits.max_chars = 100;
    handle.reload(config).unwrap();

    let err = classifier.analyze(&text).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_empty_text_rejected() {
    let err = classifier().analyze("  \n ").await.unwrap_err();
    assert!(err.is_validation());
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_any_high_risk_keyword_is_found(
        prefix in "[a-z ]{0,40}",
        suffix in "[a-z ]{0,40}",
        idx in 0usize..16,
    ) {
        let lexicon = Lexicon::default();
        let keyword = &lexicon.high_risk[idx % lexicon.high_risk.len()];
        let text = format!("{} {} {}", prefix, keyword, suffix);

        let report = runtime().block_on(classifier().analyze(&text)).unwrap();
        prop_assert!(report.high_risk.contains(keyword));

        let confidence = risk_confidence(report.high_risk.len(), report.watch.len(), 0.6);
        prop_assert!(confidence >= 0.6);
        prop_assert!(confidence <= 0.9);
    }

    #[test]
    fn prop_keyword_free_text_has_no_risk(text in "[xyz0-9][xyz0-9 ]{0,80}") {
        let report = runtime().block_on(classifier().analyze(&text)).unwrap();
        prop_assert!(report.high_risk.is_empty());
        prop_assert!(report.watch.is_empty());
        prop_assert_eq!(risk_confidence(0, 0, 0.6), 0.1);
    }

    #[test]
    fn prop_scores_bounded(words in proptest::collection::vec("(idiota|burra|você deveria|toda mãe|oi)", 0..12)) {
        let text = format!("x {}", words.join(" "));
        let report = runtime().block_on(classifier().analyze(&text)).unwrap();
        prop_assert!((0.0..=1.0).contains(&report.judgement_score));
        prop_assert!((0.0..=1.0).contains(&report.toxicity_score));
        prop_assert!(report.sentiment.intensity <= 10);
    }
}
