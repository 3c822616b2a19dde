//! Shared audit log
//!
//! Wraps an [`AuditTrail`] behind a mutex and optionally mirrors every
//! event to a JSON-lines file. Serves as the SOS recorder.

use crate::audit::{AuditEvent, AuditKind, AuditSeverity, AuditTrail};
use async_trait::async_trait;
use nathia_core::Result;
use nathia_policy::{SosEvent, SosRecorder};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct AuditLog {
    trail: Mutex<AuditTrail>,
    sink: Option<Mutex<File>>,
    path: Option<PathBuf>,
}

impl AuditLog {
    /// In-memory log only
    pub fn in_memory() -> Self {
        Self {
            trail: Mutex::new(AuditTrail::new()),
            sink: None,
            path: None,
        }
    }

    /// Log that also appends each event to `path` as one JSON line
    pub fn with_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "Audit log opened");

        Ok(Self {
            trail: Mutex::new(AuditTrail::new()),
            sink: Some(Mutex::new(file)),
            path: Some(path),
        })
    }

    /// Keep at most `retention` events in memory; the file mirror keeps all
    pub fn retaining(self, retention: usize) -> Self {
        Self {
            trail: Mutex::new(AuditTrail::with_retention(retention)),
            ..self
        }
    }

    /// Append an event; returns its chain hash
    pub fn append(&self, event: AuditEvent) -> Result<String> {
        let mut trail = self.trail.lock();
        let hash = trail.add_event(event);

        if let (Some(sink), Some(event)) = (&self.sink, trail.events().back()) {
            let line = serde_json::to_string(event)?;
            let mut file = sink.lock();
            writeln!(file, "{}", line)?;
            file.flush()?;
        }

        debug!(hash = %hash, "Audit event appended");
        Ok(hash)
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.trail.lock().events().iter().cloned().collect()
    }

    pub fn verify(&self) -> bool {
        self.trail.lock().verify()
    }

    /// Hash of the newest event
    pub fn head(&self) -> Option<String> {
        self.trail.lock().head().map(str::to_string)
    }

    pub fn len(&self) -> usize {
        self.trail.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trail.lock().is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[async_trait]
impl SosRecorder for AuditLog {
    async fn record(&self, event: &SosEvent) -> Result<()> {
        let audit = AuditEvent::new(AuditKind::SosTriggered, event.user_id.clone())
            .with_severity(AuditSeverity::Critical)
            .with_data(event);
        self.append(audit)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};

    #[tokio::test]
    async fn test_sos_recorded_in_chain() {
        let log = AuditLog::in_memory();
        log.record(&SosEvent::new("user-1", "quero morrer")).await.unwrap();
        log.record(&SosEvent::new("", "contexto")).await.unwrap();

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, AuditKind::SosTriggered);
        assert_eq!(events[1].subject, "anonymous");
        assert!(log.verify());
    }

    #[test]
    fn test_retaining_bounds_memory() {
        let log = AuditLog::in_memory().retaining(3);
        let hashes: Vec<String> = (0..5)
            .map(|i| log.append(AuditEvent::new(AuditKind::PostHidden, format!("post-{i}"))).unwrap())
            .collect();

        assert_eq!(log.len(), 3);
        assert_eq!(log.events()[0].subject, "post-2");
        assert_eq!(log.head().as_ref(), hashes.last());
        assert!(log.verify());
    }

    #[tokio::test]
    async fn test_file_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let log = AuditLog::with_file(&path).unwrap();
        log.record(&SosEvent::new("user-1", "contexto")).await.unwrap();
        log.append(AuditEvent::new(AuditKind::PostHidden, "post-1")).unwrap();

        let lines: Vec<String> = BufReader::new(File::open(&path).unwrap())
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines.len(), 2);

        let second: AuditEvent = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(second.kind, AuditKind::PostHidden);
        assert_eq!(second.previous_hash, log.events()[0].hash);
    }
}
