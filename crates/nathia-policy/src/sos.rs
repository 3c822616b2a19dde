//! SOS protocol
//!
//! Triggering SOS has two side effects, an audit record and a moderation
//! notification. They run independently: a failure in one is logged and
//! reported in the outcome but never blocks the other. Each is bounded by
//! `sos_side_effect_timeout_ms`, so the emergency contacts are always
//! returned.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nathia_core::{ConfigHandle, EmergencyContact, ErrorCode, NathiaError, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{error::Elapsed, timeout};
use tracing::{error, info, warn};
use uuid::Uuid;

pub const ANONYMOUS_USER: &str = "anonymous";

/// One SOS activation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SosEvent {
    pub id: Uuid,
    pub user_id: String,
    pub context: String,
    pub triggered_at: DateTime<Utc>,
}

impl SosEvent {
    pub fn new(user_id: &str, context: impl Into<String>) -> Self {
        let user_id = user_id.trim();
        Self {
            id: Uuid::new_v4(),
            user_id: if user_id.is_empty() {
                ANONYMOUS_USER.to_string()
            } else {
                user_id.to_string()
            },
            context: context.into(),
            triggered_at: Utc::now(),
        }
    }
}

/// Durable record of SOS activations
#[async_trait]
pub trait SosRecorder: Send + Sync {
    async fn record(&self, event: &SosEvent) -> Result<()>;
}

/// Channel that alerts the human moderation team
#[async_trait]
pub trait ModerationChannel: Send + Sync {
    async fn notify(&self, event: &SosEvent) -> Result<()>;
}

/// Moderation channel that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

#[async_trait]
impl ModerationChannel for LogChannel {
    async fn notify(&self, event: &SosEvent) -> Result<()> {
        warn!(
            sos_id = %event.id,
            user_id = %event.user_id,
            "SOS triggered, moderation team notified"
        );
        Ok(())
    }
}

/// Result of an SOS activation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SosOutcome {
    pub event_id: Uuid,
    pub contacts: Vec<EmergencyContact>,
    /// Audit record written
    pub recorded: bool,
    /// Moderation team notified
    pub notified: bool,
}

pub struct SosProtocol {
    recorder: Arc<dyn SosRecorder>,
    channel: Arc<dyn ModerationChannel>,
    config: ConfigHandle,
}

impl SosProtocol {
    pub fn new(
        recorder: Arc<dyn SosRecorder>,
        channel: Arc<dyn ModerationChannel>,
        config: ConfigHandle,
    ) -> Self {
        Self {
            recorder,
            channel,
            config,
        }
    }

    /// Record, notify and return emergency contacts. Never fails.
    pub async fn trigger_sos(&self, user_id: &str, context: &str) -> SosOutcome {
        let event = SosEvent::new(user_id, context);
        metrics::counter!("nathia_sos_total").increment(1);
        info!(sos_id = %event.id, user_id = %event.user_id, "SOS protocol started");

        let config = self.config.current();
        let limit = Duration::from_millis(config.sos_side_effect_timeout_ms);
        let (recorded, notified) = futures::join!(
            timeout(limit, self.recorder.record(&event)),
            timeout(limit, self.channel.notify(&event)),
        );

        let recorded = settle(&event, "audit record", recorded);
        let notified = settle(&event, "moderation notification", notified);

        SosOutcome {
            event_id: event.id,
            contacts: config.emergency_contacts.clone(),
            recorded,
            notified,
        }
    }
}

/// Log a failed or timed-out side effect; true on success
fn settle(event: &SosEvent, effect: &str, result: std::result::Result<Result<()>, Elapsed>) -> bool {
    let err = match result {
        Ok(Ok(())) => return true,
        Ok(Err(e)) => NathiaError::new(ErrorCode::SosSideEffectFailed, format!("{} failed", effect))
            .with_source(e),
        Err(elapsed) => {
            NathiaError::new(ErrorCode::SosSideEffectFailed, format!("{} timed out", effect))
                .with_source(elapsed)
        }
    };
    error!(sos_id = %event.id, effect, error = %err, source = ?err.source, "SOS side effect failed");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use nathia_core::Error;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MemoryRecorder {
        events: Mutex<Vec<SosEvent>>,
    }

    #[async_trait]
    impl SosRecorder for MemoryRecorder {
        async fn record(&self, event: &SosEvent) -> Result<()> {
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    struct FailingRecorder;

    #[async_trait]
    impl SosRecorder for FailingRecorder {
        async fn record(&self, _event: &SosEvent) -> Result<()> {
            Err(Error::internal("storage offline"))
        }
    }

    #[derive(Default)]
    struct CountingChannel {
        notified: Mutex<u32>,
    }

    #[async_trait]
    impl ModerationChannel for CountingChannel {
        async fn notify(&self, _event: &SosEvent) -> Result<()> {
            *self.notified.lock() += 1;
            Ok(())
        }
    }

    struct FailingChannel;

    #[async_trait]
    impl ModerationChannel for FailingChannel {
        async fn notify(&self, _event: &SosEvent) -> Result<()> {
            Err(Error::internal("webhook down"))
        }
    }

    #[tokio::test]
    async fn test_all_effects_succeed() {
        let recorder = Arc::new(MemoryRecorder::default());
        let channel = Arc::new(CountingChannel::default());
        let sos = SosProtocol::new(recorder.clone(), channel.clone(), ConfigHandle::default());

        let outcome = sos.trigger_sos("user-1", "quero morrer").await;

        assert!(outcome.recorded);
        assert!(outcome.notified);
        assert_eq!(outcome.contacts.len(), 3);
        assert_eq!(outcome.contacts[0].phone, "188");
        assert_eq!(recorder.events.lock()[0].user_id, "user-1");
        assert_eq!(*channel.notified.lock(), 1);
    }

    #[tokio::test]
    async fn test_failed_audit_still_notifies() {
        let channel = Arc::new(CountingChannel::default());
        let sos = SosProtocol::new(Arc::new(FailingRecorder), channel.clone(), ConfigHandle::default());

        let outcome = sos.trigger_sos("user-1", "contexto").await;

        assert!(!outcome.recorded);
        assert!(outcome.notified);
        assert_eq!(*channel.notified.lock(), 1);
        assert_eq!(outcome.contacts.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_notification_still_records() {
        let recorder = Arc::new(MemoryRecorder::default());
        let sos = SosProtocol::new(recorder.clone(), Arc::new(FailingChannel), ConfigHandle::default());

        let outcome = sos.trigger_sos("user-1", "contexto").await;

        assert!(outcome.recorded);
        assert!(!outcome.notified);
        assert_eq!(recorder.events.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_both_effects_fail_contacts_returned() {
        let sos = SosProtocol::new(Arc::new(FailingRecorder), Arc::new(FailingChannel), ConfigHandle::default());
        let outcome = sos.trigger_sos("", "contexto").await;

        assert!(!outcome.recorded);
        assert!(!outcome.notified);
        assert_eq!(outcome.contacts, EmergencyContact::defaults());
    }

    struct StalledChannel;

    #[async_trait]
    impl ModerationChannel for StalledChannel {
        async fn notify(&self, _event: &SosEvent) -> Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_notification_times_out() {
        let recorder = Arc::new(MemoryRecorder::default());
        let sos = SosProtocol::new(recorder.clone(), Arc::new(StalledChannel), ConfigHandle::default());

        let started = tokio::time::Instant::now();
        let outcome = sos.trigger_sos("user-1", "quero morrer").await;

        assert!(outcome.recorded);
        assert!(!outcome.notified);
        assert_eq!(outcome.contacts.len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(5_000));
    }

    #[test]
    fn test_blank_user_is_anonymous() {
        assert_eq!(SosEvent::new("   ", "x").user_id, ANONYMOUS_USER);
        assert_eq!(SosEvent::new(" maria ", "x").user_id, "maria");
    }
}
