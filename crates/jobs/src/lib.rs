//! Job service
//!
//! Materializes conversation outcomes and API requests into persisted jobs:
//! atomic job numbering, validated status transitions, history rows, routing
//! and scheduling handoff, notifications, and audit entries.

mod notify;
mod service;

pub use notify::{
    Notification, NotificationChannel, SimulatedEmailChannel, SimulatedSmsChannel,
};
pub use service::{JobService, StatusUpdate};

use thiserror::Error;

/// Job service errors
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Storage error: {0}")]
    Storage(#[from] call_agent_storage::StorageError),

    #[error("Compliance error: {0}")]
    Compliance(#[from] call_agent_compliance::ComplianceError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] call_agent_dispatch::DispatchError),

    #[error("Scheduling error: {0}")]
    Scheduling(#[from] call_agent_scheduling::SchedulingError),

    #[error("Job not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("Illegal transition: {0}")]
    IllegalTransition(#[from] call_agent_core::CoreError),

    #[error("Tenant not found")]
    TenantNotFound,
}
