//! Core types for NAT-IA

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Sender of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single chat message, owned by the caller for one turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Sender role
    pub role: Role,

    /// Raw text content
    pub content: String,

    /// When the message was sent
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message stamped with the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Emotional direction of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Valence {
    Positive,
    Neutral,
    Negative,
}

/// Per-message sentiment, derived and never persisted by the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentAnalysis {
    /// Dominant emotion label
    pub sentiment: String,

    /// Intensity on a 0-10 scale
    pub intensity: u8,

    pub valence: Valence,

    /// Emotional keywords found in the text
    pub keywords: BTreeSet<String>,
}

/// Risk band assigned by triage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Ok,
    Watch,
    Risk,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Watch => "watch",
            Self::Risk => "risk",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Support resources that can be suggested to a user in distress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceId {
    /// CVV emotional support line (188)
    CrisisLine,
    /// SAMU medical emergency (192)
    EmergencyLine,
    /// Ligue 180, violence against women
    DomesticViolenceLine,
}

impl ResourceId {
    /// Resources attached to every escalated assessment, in display order
    pub const ESCALATION: [ResourceId; 3] = [
        ResourceId::CrisisLine,
        ResourceId::EmergencyLine,
        ResourceId::DomesticViolenceLine,
    ];
}

/// A reachable emergency contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: ResourceId,
    pub name: String,
    pub phone: String,
    pub description: String,
}

impl EmergencyContact {
    /// Brazilian national support lines
    pub fn defaults() -> Vec<EmergencyContact> {
        vec![
            EmergencyContact {
                id: ResourceId::CrisisLine,
                name: "CVV - Centro de Valorização da Vida".to_string(),
                phone: "188".to_string(),
                description: "Apoio emocional gratuito, 24 horas, por telefone ou chat.".to_string(),
            },
            EmergencyContact {
                id: ResourceId::EmergencyLine,
                name: "SAMU".to_string(),
                phone: "192".to_string(),
                description: "Emergência médica para você ou para o bebê.".to_string(),
            },
            EmergencyContact {
                id: ResourceId::DomesticViolenceLine,
                name: "Central de Atendimento à Mulher - Ligue 180".to_string(),
                phone: "180".to_string(),
                description: "Orientação e denúncia de violência contra a mulher.".to_string(),
            },
        ]
    }
}

/// Output of risk triage for one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub level: RiskLevel,

    /// Matched keywords, in configured-list order
    pub signals: Vec<String>,

    /// Confidence in the assigned level (0.0-1.0)
    pub confidence: f64,

    pub requires_human_review: bool,

    pub suggested_resources: Vec<ResourceId>,
}

/// Output of moderation for one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationAnalysis {
    /// Judgemental tone score (0.0-1.0)
    pub judgement_score: f64,

    /// Toxic language score (0.0-1.0)
    pub toxicity_score: f64,

    pub is_safe: bool,

    /// Triggered concern identifiers
    pub concerns: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_rewrite: Option<String>,

    /// Human-readable, multi-paragraph explanation
    pub rationale: String,
}

/// Publishing decision derived from a [`ModerationAnalysis`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationDecision {
    Approve,
    Review,
    Reject,
}

impl ModerationDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Review => "review",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for ModerationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
