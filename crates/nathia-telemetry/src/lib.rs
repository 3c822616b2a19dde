//! NAT-IA Telemetry
//!
//! Audit trail and local counters for the safety pipeline.
//!
//! Provides:
//! - A hash-chained audit trail for SOS activations and moderation outcomes
//! - A shared audit log that records SOS events, optionally mirrored to disk
//! - An atomic metrics collector for the health endpoint

pub mod audit;
pub mod log;
pub mod metrics;

pub use audit::{AuditEvent, AuditKind, AuditSeverity, AuditTrail};
pub use log::AuditLog;
pub use metrics::{MetricsCollector, MetricsSnapshot};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::audit::{AuditEvent, AuditTrail};
    pub use crate::log::AuditLog;
    pub use crate::metrics::MetricsCollector;
}
