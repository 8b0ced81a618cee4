//! Conversation engine
//!
//! Per-session flow control: intent detection, slot filling, triage and
//! emergency escalation, template and LLM response generation, and the
//! handoff that turns a finished intake into a persisted job.

mod conversation;
mod intent;
mod profile;
mod slots;

pub use conversation::{
    AgentResponse, Channel, ConversationEngine, ConversationState, EngineConfig, SessionEnd,
};
pub use intent::{DetectedIntent, Intent, IntentDetector};
pub use profile::{IndustryProfile, ProfileKey};
pub use slots::{SlotKey, SlotStore};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Session has ended")]
    SessionEnded,

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] call_agent_pipeline::PipelineError),

    #[error("Job error: {0}")]
    Job(#[from] call_agent_jobs::JobError),

    #[error("Storage error: {0}")]
    Storage(#[from] call_agent_storage::StorageError),
}
