//! Hash-chained audit trail
//!
//! Each event stores the hash of its predecessor, so editing or dropping
//! an event anywhere in the chain breaks [`AuditTrail::verify`].

use chrono::{DateTime, Utc};
use nathia_core::{ModerationAnalysis, ModerationDecision};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use uuid::Uuid;

pub struct AuditTrail {
    events: VecDeque<AuditEvent>,
    chain_hash: Option<String>,
    /// Hash of the newest evicted event
    anchor: Option<String>,
    retention: usize,
}

/// Events kept in memory unless configured otherwise
pub const DEFAULT_RETENTION: usize = 10_000;

impl AuditTrail {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    /// Trail that keeps only the newest `retention` events in memory.
    /// The chain itself is unbroken; evicted events only leave the window.
    pub fn with_retention(retention: usize) -> Self {
        Self {
            events: VecDeque::new(),
            chain_hash: None,
            anchor: None,
            retention: retention.max(1),
        }
    }

    /// Chain and append an event, returning its hash
    pub fn add_event(&mut self, mut event: AuditEvent) -> String {
        event.previous_hash = self.chain_hash.clone();

        let hash = compute_hash(&event);
        event.hash = Some(hash.clone());

        self.chain_hash = Some(hash.clone());
        self.events.push_back(event);
        while self.events.len() > self.retention {
            if let Some(evicted) = self.events.pop_front() {
                self.anchor = evicted.hash;
            }
        }
        hash
    }

    /// Verify the integrity of the retained window
    pub fn verify(&self) -> bool {
        let mut prev_hash = self.anchor.clone();

        for event in &self.events {
            if event.previous_hash != prev_hash {
                return false;
            }
            if event.hash.as_deref() != Some(compute_hash(event).as_str()) {
                return false;
            }
            prev_hash = event.hash.clone();
        }

        true
    }

    pub fn events(&self) -> &VecDeque<AuditEvent> {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn head(&self) -> Option<&str> {
        self.chain_hash.as_deref()
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_hash(event: &AuditEvent) -> String {
    let mut hasher = Sha256::new();

    hasher.update(event.id.as_bytes());
    hasher.update(event.kind.as_str().as_bytes());
    hasher.update(event.subject.as_bytes());
    if let Some(ref data) = event.data {
        hasher.update(data.as_bytes());
    }
    hasher.update(event.timestamp.to_rfc3339().as_bytes());
    if let Some(ref prev) = event.previous_hash {
        hasher.update(prev.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    SosTriggered,
    ModerationDecision,
    PostHidden,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SosTriggered => "sos_triggered",
            Self::ModerationDecision => "moderation_decision",
            Self::PostHidden => "post_hidden",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

/// A single event in the trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub kind: AuditKind,
    /// User or post the event concerns
    pub subject: String,
    /// JSON payload
    pub data: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub severity: AuditSeverity,
    pub hash: Option<String>,
    pub previous_hash: Option<String>,
}

impl AuditEvent {
    pub fn new(kind: AuditKind, subject: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            subject: subject.into(),
            data: None,
            timestamp: Utc::now(),
            severity: AuditSeverity::Info,
            hash: None,
            previous_hash: None,
        }
    }

    pub fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = serde_json::to_string(&data).ok();
        self
    }

    pub fn with_severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Moderation outcome for a community post
    pub fn moderation(
        post_id: &str,
        analysis: &ModerationAnalysis,
        decision: ModerationDecision,
    ) -> Self {
        let severity = match decision {
            ModerationDecision::Approve => AuditSeverity::Info,
            ModerationDecision::Review => AuditSeverity::Warning,
            ModerationDecision::Reject => AuditSeverity::Critical,
        };
        Self::new(AuditKind::ModerationDecision, post_id)
            .with_severity(severity)
            .with_data(serde_json::json!({
                "decision": decision,
                "judgementScore": analysis.judgement_score,
                "toxicityScore": analysis.toxicity_score,
                "concerns": analysis.concerns,
            }))
    }
}
