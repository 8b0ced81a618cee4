//! Unified call events
//!
//! Adapters translate provider payloads into these events and push them onto
//! a per-call channel. A dropped event is a fatal session fault; the session
//! owning the call must be aborted.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use call_agent_core::AudioFrame;

/// Why a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HangupCause {
    CallerHangup,
    AgentHangup,
    Transferred,
    ProviderError,
    Timeout,
    Busy,
}

/// Normalized call event stream
#[derive(Debug, Clone)]
pub enum CallEvent {
    CallIncoming {
        call_id: Uuid,
        from: String,
        to: String,
        trunk: String,
        timestamp: DateTime<Utc>,
    },
    CallAnswered {
        call_id: Uuid,
    },
    CallEnded {
        call_id: Uuid,
        cause: HangupCause,
    },
    Dtmf {
        call_id: Uuid,
        digit: char,
    },
    Audio {
        call_id: Uuid,
        frame: AudioFrame,
    },
}

impl CallEvent {
    pub fn call_id(&self) -> Uuid {
        match self {
            CallEvent::CallIncoming { call_id, .. }
            | CallEvent::CallAnswered { call_id }
            | CallEvent::CallEnded { call_id, .. }
            | CallEvent::Dtmf { call_id, .. }
            | CallEvent::Audio { call_id, .. } => *call_id,
        }
    }
}
