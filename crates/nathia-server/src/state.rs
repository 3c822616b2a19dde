//! Shared application state

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use nathia_chat::{
    ChatOrchestrator, HttpGenerator, HttpQaClient, QaProvider, QaService, TextGenerator,
};
use nathia_classifiers::{Lexicon, LexiconClassifier, SignalClassifier};
use nathia_core::{CircuitBreaker, ConfigHandle, Message, Resilient, Role};
use nathia_policy::{LogChannel, ModerationEngine, ReportLedger, RiskTriage, SosProtocol};
use nathia_telemetry::{AuditLog, MetricsCollector};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::sanitize::Sanitizer;
use crate::security::{validate_provider_url, EndpointPolicy};

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Hot-reloadable safety configuration
    pub config: ConfigHandle,

    /// File re-read by `/admin/config/reload`
    pub config_path: Option<PathBuf>,

    /// Startup-only settings
    pub settings: Arc<ServerConfig>,

    pub orchestrator: Arc<ChatOrchestrator>,
    pub triage: Arc<RiskTriage>,
    pub moderation: Arc<ModerationEngine>,
    pub sos: Arc<SosProtocol>,
    pub reports: Arc<ReportLedger>,
    pub qa: Option<Arc<QaService>>,

    pub messages: Arc<MessageStore>,
    pub sanitizer: Arc<Sanitizer>,

    /// One breaker per outbound dependency
    pub breakers: Arc<[Arc<CircuitBreaker>]>,

    pub audit: Arc<AuditLog>,
    pub collector: MetricsCollector,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: PrometheusHandle,
}

/// Outbound AI clients
pub struct Providers {
    pub generator: Arc<dyn TextGenerator>,
    pub qa: Option<Arc<dyn QaProvider>>,
}

impl Providers {
    /// HTTP clients for the configured endpoints, after validating them
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let policy = EndpointPolicy::for_mode(config.development);

        validate_provider_url(&config.generator.endpoint, &policy)?;
        if config.generator.api_key.is_none() {
            warn!("No generator API key configured; provider calls will be rejected");
        }
        let generator: Arc<dyn TextGenerator> = Arc::new(HttpGenerator::new(config.generator.clone())?);

        let qa = match &config.qa {
            Some(qa_config) => {
                validate_provider_url(&qa_config.endpoint, &policy)?;
                let client: Arc<dyn QaProvider> = Arc::new(HttpQaClient::new(qa_config.clone())?);
                Some(client)
            }
            None => {
                info!("No Q&A provider configured");
                None
            }
        };

        Ok(Self { generator, qa })
    }
}

impl AppState {
    /// Build state with HTTP providers from configuration
    pub fn new(
        config: ServerConfig,
        config_path: Option<PathBuf>,
        metrics_handle: PrometheusHandle,
    ) -> Result<Self> {
        let providers = Providers::from_config(&config)?;
        Self::with_providers(config, config_path, providers, metrics_handle)
    }

    /// Build state around the given providers
    pub fn with_providers(
        config: ServerConfig,
        config_path: Option<PathBuf>,
        providers: Providers,
        metrics_handle: PrometheusHandle,
    ) -> Result<Self> {
        let handle = ConfigHandle::new(config.safety.clone())?;

        let lexicon = match &config.lexicon_path {
            Some(path) => {
                info!(path = %path.display(), "Loading lexicon");
                Lexicon::from_file(path)?
            }
            None => Lexicon::default(),
        };
        let classifier: Arc<dyn SignalClassifier> =
            Arc::new(LexiconClassifier::new(&lexicon, handle.clone())?);

        let audit = match &config.audit_path {
            Some(path) => AuditLog::with_file(path)?,
            None => AuditLog::in_memory(),
        };
        let audit = Arc::new(audit.retaining(config.audit_retention));
        let sos = Arc::new(SosProtocol::new(audit.clone(), Arc::new(LogChannel), handle.clone()));

        let retry = config.api_retry();
        let generator_breaker = Arc::new(CircuitBreaker::new(
            providers.generator.name().to_string(),
            config.safety.circuit.clone(),
        ));
        let orchestrator = ChatOrchestrator::new(
            classifier.clone(),
            sos.clone(),
            providers.generator,
            Resilient::new(generator_breaker.clone(), retry),
            handle.clone(),
        )?;

        let mut breakers = vec![generator_breaker];
        let qa = providers.qa.map(|provider| {
            let breaker = Arc::new(CircuitBreaker::new("qa", config.safety.circuit.clone()));
            breakers.push(breaker.clone());
            Arc::new(QaService::new(provider, Resilient::new(breaker, retry)))
        });

        info!(
            breakers = breakers.len(),
            audit_file = config.audit_path.is_some(),
            "Application state ready"
        );

        Ok(Self {
            triage: Arc::new(RiskTriage::new(classifier.clone(), handle.clone())),
            moderation: Arc::new(ModerationEngine::new(classifier, handle.clone())?),
            reports: Arc::new(ReportLedger::new(handle.clone())),
            orchestrator: Arc::new(orchestrator),
            sos,
            qa,
            messages: Arc::new(MessageStore::with_capacity(config.max_history_per_user)),
            sanitizer: Arc::new(Sanitizer::new()?),
            breakers: breakers.into(),
            audit,
            collector: MetricsCollector::new(),
            metrics_handle,
            config: handle,
            config_path,
            settings: Arc::new(config),
        })
    }
}

/// A persisted chat message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: Uuid,
    pub user_id: String,
    pub role: Role,
    pub content: String,
    /// Decoded attachment size, when one was sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_bytes: Option<usize>,
    pub created_at: DateTime<Utc>,
}

/// In-memory chat history, per user, keeping the newest `capacity` messages
pub struct MessageStore {
    by_user: RwLock<HashMap<String, VecDeque<StoredMessage>>>,
    capacity: usize,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::with_capacity(50)
    }
}

impl MessageStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            by_user: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn append(
        &self,
        user_id: &str,
        role: Role,
        content: String,
        attachment_bytes: Option<usize>,
    ) -> StoredMessage {
        let message = StoredMessage {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            role,
            content,
            attachment_bytes,
            created_at: Utc::now(),
        };

        let mut by_user = self.by_user.write();
        let messages = by_user.entry(user_id.to_string()).or_default();
        messages.push_back(message.clone());
        while messages.len() > self.capacity {
            messages.pop_front();
        }
        message
    }

    /// Last `n` messages for `user_id`, oldest first
    pub fn recent(&self, user_id: &str, n: usize) -> Vec<Message> {
        let by_user = self.by_user.read();
        let Some(messages) = by_user.get(user_id) else {
            return Vec::new();
        };
        let start = messages.len().saturating_sub(n);
        messages
            .iter()
            .skip(start)
            .map(|m| Message {
                role: m.role,
                content: m.content.clone(),
                timestamp: m.created_at,
            })
            .collect()
    }

    pub fn count(&self, user_id: &str) -> usize {
        self.by_user.read().get(user_id).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_keeps_order() {
        let store = MessageStore::default();
        store.append("u1", Role::User, "a".to_string(), None);
        store.append("u1", Role::Assistant, "b".to_string(), None);
        store.append("u1", Role::User, "c".to_string(), None);
        store.append("u2", Role::User, "x".to_string(), None);

        let recent = store.recent("u1", 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "b");
        assert_eq!(recent[1].role, Role::User);
        assert!(store.recent("nobody", 3).is_empty());
        assert_eq!(store.count("u2"), 1);
    }

    #[test]
    fn test_history_capped_per_user() {
        let store = MessageStore::with_capacity(3);
        for i in 0..10 {
            store.append("u1", Role::User, format!("m{i}"), None);
        }
        store.append("u2", Role::User, "x".to_string(), None);

        assert_eq!(store.count("u1"), 3);
        let recent = store.recent("u1", 10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "m7");
        assert_eq!(recent[2].content, "m9");
        assert_eq!(store.count("u2"), 1);
    }
}
