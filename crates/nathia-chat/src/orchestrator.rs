//! Chat turn orchestration
//!
//! One classifier pass feeds both triage and moderation. High risk goes
//! straight to the SOS protocol and the provider is never called. Shared
//! posts are moderated before anything is generated. History that would
//! itself trigger SOS never reaches the provider. Generation failures end in
//! a fixed apologetic reply, never in an error.

use crate::context::{build_context, system_instruction, UserProfile};
use crate::provider::{GenerationRequest, TextGenerator};
use nathia_classifiers::SignalClassifier;
use nathia_core::{
    ConfigHandle, EmergencyContact, ErrorCode, Message, ModerationAnalysis, ModerationDecision,
    NathiaError, Resilient, Result, RiskAssessment, RiskLevel, SentimentAnalysis,
};
use nathia_policy::{assess_report, ModerationEngine, RiskTriage, SosProtocol, DO_NOT_PUBLISH};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Sent when the provider cannot produce a reply
pub const FALLBACK_REPLY: &str = "Desculpe, não consegui responder agora. Estou aqui com você; \
tente novamente em alguns instantes.";

const SOS_OPENING: &str = "Sinto muito que você esteja passando por isso. Você não está \
sozinha, e há pessoas prontas para te ouvir agora mesmo:";

const SOS_CLOSING: &str = "Se você ou o bebê estiverem em perigo imediato, ligue para o SAMU (192).";

const REJECTED_OPENING: &str = "Sua mensagem não foi publicada porque pode soar julgadora ou \
ofensiva para outras mães.";

/// Who will see the message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// One-to-one chat with the assistant
    #[default]
    Private,
    /// Community post
    Shared,
}

#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub user_id: String,
    pub history: Vec<Message>,
    pub profile: Option<UserProfile>,
    pub visibility: Visibility,
}

/// Follow-up work attached to a turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnAction {
    Sos {
        event_id: Uuid,
        contacts: Vec<EmergencyContact>,
        recorded: bool,
        notified: bool,
    },
    HumanReview {
        reason: ReviewReason,
    },
    SuggestRewrite {
        text: String,
    },
    DoNotPublish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    /// Watch-level distress with high confidence
    EmotionalDistress,
    /// Moderation could neither approve nor reject
    Moderation,
}

/// Safety signals behind a turn
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetySummary {
    pub risk: RiskAssessment,
    pub sentiment: SentimentAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderation: Option<ModerationAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<ModerationDecision>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub reply: String,
    pub actions: Vec<TurnAction>,
    pub safety: SafetySummary,
    /// Reply is the fixed fallback
    pub fallback: bool,
}

pub struct ChatOrchestrator {
    classifier: Arc<dyn SignalClassifier>,
    triage: RiskTriage,
    moderation: ModerationEngine,
    sos: Arc<SosProtocol>,
    generator: Arc<dyn TextGenerator>,
    resilient: Resilient,
    config: ConfigHandle,
}

impl ChatOrchestrator {
    pub fn new(
        classifier: Arc<dyn SignalClassifier>,
        sos: Arc<SosProtocol>,
        generator: Arc<dyn TextGenerator>,
        resilient: Resilient,
        config: ConfigHandle,
    ) -> Result<Self> {
        Ok(Self {
            triage: RiskTriage::new(classifier.clone(), config.clone()),
            moderation: ModerationEngine::new(classifier.clone(), config.clone())?,
            classifier,
            sos,
            generator,
            resilient,
            config,
        })
    }

    /// Handle one user turn. Fails only on invalid input.
    pub async fn handle_turn(&self, message: &str, context: &TurnContext) -> Result<TurnResponse> {
        let start = Instant::now();
        let report = self.classifier.analyze(message).await?;
        metrics::counter!("nathia_turns_total").increment(1);

        let risk = self.triage.assess(&report);
        let mut safety = SafetySummary {
            risk,
            sentiment: report.sentiment.clone(),
            moderation: None,
            decision: None,
        };
        let mut actions = Vec::new();

        if safety.risk.level == RiskLevel::Risk {
            let outcome = self.sos.trigger_sos(&context.user_id, message).await;
            let reply = sos_reply(&outcome.contacts);
            actions.push(TurnAction::Sos {
                event_id: outcome.event_id,
                contacts: outcome.contacts,
                recorded: outcome.recorded,
                notified: outcome.notified,
            });
            info!(user_id = %context.user_id, "Turn routed to SOS");
            return Ok(TurnResponse {
                reply,
                actions,
                safety,
                fallback: false,
            });
        }

        if context.visibility == Visibility::Shared {
            let thresholds = self.config.current().thresholds;
            let analysis = self.moderation.analyze_report(message, &report, &thresholds);
            let decision = self.moderation.decide(&analysis);

            match decision {
                ModerationDecision::Reject => {
                    let (reply, action) = rejection(&analysis);
                    actions.push(action);
                    safety.moderation = Some(analysis);
                    safety.decision = Some(decision);
                    return Ok(TurnResponse {
                        reply,
                        actions,
                        safety,
                        fallback: false,
                    });
                }
                ModerationDecision::Review => {
                    actions.push(TurnAction::HumanReview {
                        reason: ReviewReason::Moderation,
                    });
                    if let Some(rewrite) = analysis
                        .suggested_rewrite
                        .as_deref()
                        .filter(|r| *r != DO_NOT_PUBLISH)
                    {
                        actions.push(TurnAction::SuggestRewrite {
                            text: rewrite.to_string(),
                        });
                    }
                }
                ModerationDecision::Approve => {}
            }

            safety.moderation = Some(analysis);
            safety.decision = Some(decision);
        }

        let distressed = safety.risk.level == RiskLevel::Watch;
        if distressed && safety.risk.requires_human_review {
            actions.push(TurnAction::HumanReview {
                reason: ReviewReason::EmotionalDistress,
            });
        }

        let max_turns = self.config.current().history_turns;
        let history = self.safe_history(&context.history, max_turns).await;
        let request = GenerationRequest {
            system: system_instruction(distressed),
            context: build_context(&history, context.profile.as_ref(), max_turns),
            message: message.to_string(),
        };

        let (reply, fallback) = match self
            .resilient
            .execute(|_| self.generator.generate(&request))
            .await
        {
            Ok(text) => (text, false),
            Err(e) => {
                let cause = NathiaError::from(e);
                let err = NathiaError::new(
                    ErrorCode::GenerationFailed,
                    format!("{} could not generate a reply", self.generator.name()),
                )
                .with_source(cause);
                error!(code = %err.code, error = %err, source = ?err.source, "Generation failed, sending fallback");
                metrics::counter!("nathia_fallback_replies_total").increment(1);
                (FALLBACK_REPLY.to_string(), true)
            }
        };

        debug!(
            level = %safety.risk.level,
            actions = actions.len(),
            fallback,
            latency_us = start.elapsed().as_micros() as u64,
            "Turn complete"
        );

        Ok(TurnResponse {
            reply,
            actions,
            safety,
            fallback,
        })
    }

    /// Most recent `max_turns` history messages below risk level, oldest first.
    /// Messages the classifier refuses are left out too.
    async fn safe_history(&self, history: &[Message], max_turns: usize) -> Vec<Message> {
        let thresholds = self.config.current().thresholds;
        let mut kept = Vec::with_capacity(max_turns.min(history.len()));

        for message in history.iter().rev() {
            if kept.len() == max_turns {
                break;
            }
            let Ok(report) = self.classifier.analyze(&message.content).await else {
                continue;
            };
            if assess_report(&report, &thresholds).level == RiskLevel::Risk {
                debug!(role = ?message.role, "High-risk message left out of context");
                continue;
            }
            kept.push(message.clone());
        }

        kept.reverse();
        kept
    }
}

fn sos_reply(contacts: &[EmergencyContact]) -> String {
    let lines: Vec<String> = contacts
        .iter()
        .map(|c| format!("- {}: {} ({})", c.name, c.phone, c.description))
        .collect();
    format!("{}\n\n{}\n\n{}", SOS_OPENING, lines.join("\n"), SOS_CLOSING)
}

fn rejection(analysis: &ModerationAnalysis) -> (String, TurnAction) {
    match analysis.suggested_rewrite.as_deref() {
        Some(rewrite) if rewrite != DO_NOT_PUBLISH => (
            format!("{}\n\nQue tal assim?\n\"{}\"", REJECTED_OPENING, rewrite),
            TurnAction::SuggestRewrite {
                text: rewrite.to_string(),
            },
        ),
        _ => (
            format!("{}\n\n{}", REJECTED_OPENING, DO_NOT_PUBLISH),
            TurnAction::DoNotPublish,
        ),
    }
}
