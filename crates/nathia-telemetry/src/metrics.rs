//! In-process counters
//!
//! Prometheus export goes through the `metrics` facade; this collector keeps
//! a cheap local snapshot for the health endpoint.

use nathia_core::{ModerationDecision, RiskLevel};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    turns: AtomicU64,
    risk_ok: AtomicU64,
    risk_watch: AtomicU64,
    risk_high: AtomicU64,
    sos_triggered: AtomicU64,
    fallback_replies: AtomicU64,
    approved: AtomicU64,
    reviewed: AtomicU64,
    rejected: AtomicU64,
    total_latency_us: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    /// Record a completed chat turn and its latency
    pub fn record_turn(&self, latency_us: u64) {
        self.inner.turns.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);
    }

    pub fn record_risk(&self, level: RiskLevel) {
        let counter = match level {
            RiskLevel::Ok => &self.inner.risk_ok,
            RiskLevel::Watch => &self.inner.risk_watch,
            RiskLevel::Risk => &self.inner.risk_high,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sos(&self) {
        self.inner.sos_triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.inner.fallback_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decision(&self, decision: ModerationDecision) {
        let counter = match decision {
            ModerationDecision::Approve => &self.inner.approved,
            ModerationDecision::Review => &self.inner.reviewed,
            ModerationDecision::Reject => &self.inner.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            turns: load(&self.inner.turns),
            risk_ok: load(&self.inner.risk_ok),
            risk_watch: load(&self.inner.risk_watch),
            risk_high: load(&self.inner.risk_high),
            sos_triggered: load(&self.inner.sos_triggered),
            fallback_replies: load(&self.inner.fallback_replies),
            approved: load(&self.inner.approved),
            reviewed: load(&self.inner.reviewed),
            rejected: load(&self.inner.rejected),
            total_latency_us: load(&self.inner.total_latency_us),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub turns: u64,
    pub risk_ok: u64,
    pub risk_watch: u64,
    pub risk_high: u64,
    pub sos_triggered: u64,
    pub fallback_replies: u64,
    pub approved: u64,
    pub reviewed: u64,
    pub rejected: u64,
    pub total_latency_us: u64,
}

impl MetricsSnapshot {
    pub fn avg_latency_us(&self) -> u64 {
        if self.turns == 0 {
            0
        } else {
            self.total_latency_us / self.turns
        }
    }

    /// Share of turns answered with the fallback reply
    pub fn fallback_rate(&self) -> f64 {
        if self.turns == 0 {
            0.0
        } else {
            self.fallback_replies as f64 / self.turns as f64
        }
    }
}
