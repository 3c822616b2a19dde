//! NAT-IA Chat
//!
//! Turn orchestration on top of the safety pipeline, plus the clients for
//! the external AI services it calls.
//!
//! A turn goes classifier → triage → (moderation for shared posts) →
//! generation. Generation runs behind a per-dependency circuit breaker and
//! retry policy; when it fails the user gets a fixed fallback reply.

pub mod context;
pub mod orchestrator;
pub mod provider;
pub mod qa;

pub use context::{build_context, system_instruction, UserProfile, BASE_INSTRUCTION, WATCH_INSTRUCTION};
pub use orchestrator::{
    ChatOrchestrator, ReviewReason, SafetySummary, TurnAction, TurnContext, TurnResponse,
    Visibility, FALLBACK_REPLY,
};
pub use provider::{GenerationRequest, HttpGenerator, ProviderConfig, TextGenerator};
pub use qa::{HttpQaClient, QaAnswer, QaProvider, QaService};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::orchestrator::{ChatOrchestrator, TurnContext, TurnResponse, Visibility};
    pub use crate::provider::{GenerationRequest, TextGenerator};
}
