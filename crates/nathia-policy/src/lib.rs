//! NAT-IA Policy
//!
//! Safety decisions built on top of the classifier signals:
//! - Risk triage (`ok → watch → risk`) with escalation resources
//! - The SOS protocol (audit record, moderation alert, emergency contacts)
//! - Community moderation: scores, rationale, rewrite policy, decision
//! - Report counting with automatic hiding

pub mod moderation;
pub mod reports;
pub mod sos;
pub mod triage;

pub use moderation::{decide, is_safe, ModerationEngine, DO_NOT_PUBLISH, REWRITE_CEILING};
pub use reports::{ReportLedger, ReportOutcome};
pub use sos::{LogChannel, ModerationChannel, SosEvent, SosOutcome, SosProtocol, SosRecorder, ANONYMOUS_USER};
pub use triage::{assess_report, RiskTriage};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::moderation::ModerationEngine;
    pub use crate::reports::ReportLedger;
    pub use crate::sos::{SosOutcome, SosProtocol};
    pub use crate::triage::RiskTriage;
}
