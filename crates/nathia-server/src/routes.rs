//! HTTP routes and handlers

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use nathia_chat::{QaAnswer, TurnAction, TurnContext, TurnResponse, UserProfile, Visibility};
use nathia_core::{
    payload::decode_base64_bounded, Error, ErrorCode, Message, ModerationAnalysis,
    ModerationDecision, NathiaError, RiskAssessment, RiskLevel, Role, ValidationError,
};
use nathia_policy::{ReportOutcome, SosOutcome};
use nathia_telemetry::{AuditEvent, AuditKind, AuditSeverity};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::state::{AppState, StoredMessage};

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.settings.max_body_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/ai/chat", post(chat))
        .route("/api/ai/messages", post(store_message))
        .route("/api/community/posts/:id/reports", post(report_post))
        .route("/api/triage", post(triage))
        .route("/api/moderation/analyze", post(moderate))
        .route("/api/sos", post(sos))
        .route("/api/qa", post(ask))
        .route("/admin/config/reload", post(reload_config))
        .fallback(fallback)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let circuits: Vec<_> = state.breakers.iter().map(|b| b.snapshot()).collect();
    Json(json!({
        "status": "ok",
        "metrics": state.collector.snapshot(),
        "circuits": circuits,
        "audit": {
            "events": state.audit.len(),
            "head": state.audit.head(),
        },
    }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics_handle.render(),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    message: String,
    #[serde(default)]
    user_id: String,
    /// Overrides the stored history when present
    #[serde(default)]
    history: Option<Vec<Message>>,
    #[serde(default)]
    profile: Option<UserProfile>,
    #[serde(default)]
    visibility: Visibility,
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let start = Instant::now();
    let message = state.sanitizer.clean(&req.message);
    let history = match req.history {
        Some(history) => history,
        None => state
            .messages
            .recent(&req.user_id, state.config.current().history_turns),
    };

    let context = TurnContext {
        user_id: req.user_id,
        history,
        profile: req.profile,
        visibility: req.visibility,
    };
    let response = state.orchestrator.handle_turn(&message, &context).await?;

    let collector = &state.collector;
    collector.record_turn(start.elapsed().as_micros() as u64);
    collector.record_risk(response.safety.risk.level);
    if response.fallback {
        collector.record_fallback();
    }
    for action in &response.actions {
        if let TurnAction::Sos { .. } = action {
            collector.record_sos();
        }
    }
    if let (Some(analysis), Some(decision)) = (&response.safety.moderation, response.safety.decision) {
        collector.record_decision(decision);
        append_audit(&state, AuditEvent::moderation(&context.user_id, analysis, decision));
    }

    // SOS turns stay out of the replayable history
    if context.visibility == Visibility::Private
        && !context.user_id.is_empty()
        && response.safety.risk.level != RiskLevel::Risk
    {
        state.messages.append(&context.user_id, Role::User, message, None);
        state
            .messages
            .append(&context.user_id, Role::Assistant, response.reply.clone(), None);
    }

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreMessageRequest {
    user_id: String,
    #[serde(default = "default_role")]
    role: Role,
    content: String,
    /// Base64 (or `data:` URL) attachment
    #[serde(default)]
    attachment: Option<String>,
}

fn default_role() -> Role {
    Role::User
}

async fn store_message(
    State(state): State<AppState>,
    Json(req): Json<StoreMessageRequest>,
) -> Result<(StatusCode, Json<StoredMessage>), AppError> {
    if req.user_id.trim().is_empty() {
        return Err(ValidationError::MissingField("userId").into());
    }

    let max_chars = state.config.current().limits.max_chars;
    let content = state.sanitizer.message(&req.content, max_chars)?;

    let attachment_bytes = match &req.attachment {
        Some(encoded) => {
            Some(decode_base64_bounded(encoded, state.settings.max_attachment_bytes)?.len())
        }
        None => None,
    };

    let stored = state
        .messages
        .append(req.user_id.trim(), req.role, content, attachment_bytes);
    info!(message_id = %stored.id, user_id = %stored.user_id, "Message stored");

    Ok((StatusCode::CREATED, Json(stored)))
}

async fn report_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Json<ReportOutcome> {
    let outcome = state.reports.report(&post_id);
    if outcome.newly_hidden {
        let event = AuditEvent::new(AuditKind::PostHidden, post_id.as_str())
            .with_severity(AuditSeverity::Warning)
            .with_data(json!({ "reports": outcome.count }));
        append_audit(&state, event);
    }
    Json(outcome)
}

#[derive(Debug, Deserialize)]
struct TextRequest {
    text: String,
    /// Community post the text belongs to
    #[serde(default, rename = "postId")]
    post_id: Option<String>,
}

async fn triage(
    State(state): State<AppState>,
    Json(req): Json<TextRequest>,
) -> Result<Json<RiskAssessment>, AppError> {
    let assessment = state.triage.assess_risk(&req.text).await?;
    state.collector.record_risk(assessment.level);
    Ok(Json(assessment))
}

#[derive(Debug, Serialize)]
struct ModerationResponse {
    analysis: ModerationAnalysis,
    decision: ModerationDecision,
}

async fn moderate(
    State(state): State<AppState>,
    Json(req): Json<TextRequest>,
) -> Result<Json<ModerationResponse>, AppError> {
    let (analysis, decision) = state.moderation.moderate(&req.text).await?;
    state.collector.record_decision(decision);

    if let Some(post_id) = &req.post_id {
        append_audit(&state, AuditEvent::moderation(post_id, &analysis, decision));
    }

    Ok(Json(ModerationResponse { analysis, decision }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SosRequest {
    user_id: String,
    context: String,
}

async fn sos(State(state): State<AppState>, Json(req): Json<SosRequest>) -> Json<SosOutcome> {
    let outcome = state.sos.trigger_sos(&req.user_id, &req.context).await;
    state.collector.record_sos();
    Json(outcome)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QaRequest {
    question: String,
    #[serde(default)]
    user_id: String,
}

async fn ask(
    State(state): State<AppState>,
    Json(req): Json<QaRequest>,
) -> Result<Json<QaAnswer>, AppError> {
    let service = state.qa.as_ref().ok_or_else(|| {
        AppError::from(NathiaError::new(
            ErrorCode::ProviderUnavailable,
            "no Q&A provider configured",
        ))
    })?;
    let answer = service.ask(&req.question, &req.user_id).await?;
    Ok(Json(answer))
}

async fn reload_config(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let path = state
        .config_path
        .as_deref()
        .ok_or_else(|| AppError::Config("server was started without a configuration file".to_string()))?;

    let next = ServerConfig::from_file(path).map_err(|e| AppError::Config(format!("{:#}", e)))?;
    state
        .config
        .reload(next.safety)
        .map_err(|e| AppError::Config(e.to_string()))?;

    info!(path = %path.display(), "Safety configuration reloaded");
    Ok(Json(json!({ "reloaded": true })))
}

async fn fallback() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": { "code": "not_found", "message": "Not found" } })),
    )
}

/// Audit failures are logged, never surfaced to the caller
fn append_audit(state: &AppState, event: AuditEvent) {
    let kind = event.kind;
    if let Err(e) = state.audit.append(event) {
        error!(kind = kind.as_str(), error = %e, "Audit append failed");
    }
}

/// Error handling
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Pipeline(NathiaError),
    Config(String),
    Internal(String),
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(e) => AppError::Validation(e),
            Error::Nathia(e) => AppError::Pipeline(e),
            Error::Config(msg) => AppError::Config(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<NathiaError> for AppError {
    fn from(err: NathiaError) -> Self {
        AppError::Pipeline(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Validation(e) => {
                (StatusCode::BAD_REQUEST, "validation_error", e.to_string())
            }
            AppError::Pipeline(e) => {
                let status = match e.code {
                    ErrorCode::LimitExceeded => StatusCode::TOO_MANY_REQUESTS,
                    ErrorCode::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                    ErrorCode::ProviderExhausted | ErrorCode::ProviderRejected => {
                        StatusCode::BAD_GATEWAY
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                warn!(code = %e.code, error = %e, source = ?e.source, "Request failed");
                (status, e.code.as_str(), e.user_message().to_string())
            }
            AppError::Config(msg) => {
                warn!(error = %msg, "Configuration rejected");
                (StatusCode::BAD_REQUEST, ErrorCode::ConfigInvalid.as_str(), msg)
            }
            AppError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Internal.as_str(),
                    "Não foi possível concluir sua solicitação agora.".to_string(),
                )
            }
        };

        let body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}
