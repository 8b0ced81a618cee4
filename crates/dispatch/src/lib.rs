//! Job routing and technician matching
//!
//! The routing engine evaluates a tenant's ordered rule set against a job
//! and picks a department or worker. The technician matcher ranks candidate
//! workers with a weighted multi-factor score.

mod escalation;
mod matcher;
mod routing;

pub use escalation::{EscalationDue, EscalationTimers};
pub use matcher::{MatchOutcome, MatchRequest, TechnicianMatch, TechnicianMatcher};
pub use routing::{RoutingDecision, RoutingEngine};

use thiserror::Error;

/// Dispatch errors
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Storage error: {0}")]
    Storage(#[from] call_agent_storage::StorageError),

    #[error("No routing rule matched and no fallback is configured")]
    NoRouteFound,

    #[error("No technician available")]
    NoneAvailable,
}
