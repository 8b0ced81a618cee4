//! HTTP/WS surface and session supervision
//!
//! Hosts the REST API, the chat WebSocket, provider webhooks, and the
//! supervisor owning every live session.

pub mod error;
pub mod http;
pub mod phone;
pub mod session;
pub mod state;
pub mod webhooks;
pub mod ws;

pub use error::ApiError;
pub use session::{SessionHandle, SessionSupervisor};
pub use state::AppState;

use thiserror::Error;

/// Server-internal errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Too many concurrent sessions")]
    Overloaded,

    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("Tenant not found")]
    TenantNotFound,

    #[error("Storage error: {0}")]
    Storage(#[from] call_agent_storage::StorageError),

    #[error("Agent error: {0}")]
    Agent(#[from] call_agent_agent::AgentError),

    #[error("Telephony error: {0}")]
    Telephony(#[from] call_agent_telephony::TelephonyError),
}
