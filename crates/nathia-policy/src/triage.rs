//! Risk triage
//!
//! Maps classifier signals onto `ok → watch → risk`. Each message is
//! assessed on its own; there is no accumulation across a session.

use nathia_classifiers::{risk_confidence, SignalClassifier, SignalReport};
use nathia_core::{ConfigHandle, ResourceId, Result, RiskAssessment, RiskLevel, Thresholds};
use std::sync::Arc;
use tracing::{info, warn};

pub struct RiskTriage {
    classifier: Arc<dyn SignalClassifier>,
    config: ConfigHandle,
}

impl RiskTriage {
    pub fn new(classifier: Arc<dyn SignalClassifier>, config: ConfigHandle) -> Self {
        Self { classifier, config }
    }

    /// Assess one message; fails only on invalid input
    pub async fn assess_risk(&self, text: &str) -> Result<RiskAssessment> {
        let report = self.classifier.analyze(text).await?;
        Ok(self.assess(&report))
    }

    /// Assess an already-extracted report under the active thresholds
    pub fn assess(&self, report: &SignalReport) -> RiskAssessment {
        let thresholds = self.config.current().thresholds;
        let assessment = assess_report(report, &thresholds);

        metrics::counter!("nathia_risk_assessments_total", "level" => assessment.level.as_str())
            .increment(1);

        match assessment.level {
            RiskLevel::Risk => warn!(
                signals = ?assessment.signals,
                confidence = assessment.confidence,
                "High-risk message detected"
            ),
            RiskLevel::Watch if assessment.requires_human_review => info!(
                signals = ?assessment.signals,
                confidence = assessment.confidence,
                "Watch-level message flagged for review"
            ),
            _ => {}
        }

        assessment
    }
}

/// Pure triage rule over a signal report
pub fn assess_report(report: &SignalReport, thresholds: &Thresholds) -> RiskAssessment {
    let high = report.high_risk.len();
    let watch = report.watch.len();

    let level = if high > 0 {
        RiskLevel::Risk
    } else if watch > 0 {
        RiskLevel::Watch
    } else {
        RiskLevel::Ok
    };

    let confidence = risk_confidence(high, watch, thresholds.risk);

    let requires_human_review = match level {
        RiskLevel::Risk => true,
        RiskLevel::Watch => confidence > thresholds.observation,
        RiskLevel::Ok => false,
    };

    let suggested_resources = if requires_human_review {
        ResourceId::ESCALATION.to_vec()
    } else {
        Vec::new()
    };

    let signals = report
        .high_risk
        .iter()
        .chain(report.watch.iter())
        .cloned()
        .collect();

    RiskAssessment {
        level,
        signals,
        confidence,
        requires_human_review,
        suggested_resources,
    }
}
