//! HTTP error mapping
//!
//! Every error leaving a handler becomes `{detail, code, field?}` with the
//! status code mandated by the error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use call_agent_agent::AgentError;
use call_agent_compliance::ComplianceError;
use call_agent_core::CoreError;
use call_agent_dispatch::DispatchError;
use call_agent_jobs::JobError;
use call_agent_scheduling::SchedulingError;
use call_agent_storage::StorageError;
use call_agent_telephony::TelephonyError;

use crate::ServerError;

/// Wire format for errors
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// API error with taxonomy mapping
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, detail: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                detail: detail.into(),
                code: code.to_string(),
                field: None,
            },
        }
    }

    pub fn validation(detail: impl Into<String>, field: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                detail: detail.into(),
                code: "validation".to_string(),
                field,
            },
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match &error {
            StorageError::NotFound { .. } | StorageError::TenantNotFound(_) => {
                Self::not_found(error.to_string())
            }
            StorageError::Conflict(_) => {
                Self::new(StatusCode::CONFLICT, "conflict", error.to_string())
            }
            _ => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error"),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        match &error {
            CoreError::IllegalTransition { .. } => {
                Self::new(StatusCode::CONFLICT, "illegal_transition", error.to_string())
            }
            _ => Self::validation(error.to_string(), None),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(error: JobError) -> Self {
        match error {
            JobError::NotFound(id) => Self::not_found(format!("job {}", id)),
            JobError::IllegalTransition(e) => e.into(),
            JobError::Storage(e) => e.into(),
            JobError::Scheduling(e) => e.into(),
            JobError::Compliance(e) => e.into(),
            JobError::Dispatch(e) => e.into(),
            JobError::TenantNotFound => Self::not_found("tenant"),
        }
    }
}

impl From<SchedulingError> for ApiError {
    fn from(error: SchedulingError) -> Self {
        match error {
            SchedulingError::SlotUnavailable => {
                Self::new(StatusCode::CONFLICT, "slot_unavailable", error.to_string())
            }
            SchedulingError::NoSlotsFound => Self::not_found(error.to_string()),
            SchedulingError::Storage(e) => e.into(),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::Storage(e) => e.into(),
            DispatchError::NoRouteFound => {
                Self::new(StatusCode::CONFLICT, "no_route", error.to_string())
            }
            DispatchError::NoneAvailable => {
                Self::new(StatusCode::CONFLICT, "none_available", error.to_string())
            }
        }
    }
}

impl From<ComplianceError> for ApiError {
    fn from(error: ComplianceError) -> Self {
        match &error {
            ComplianceError::ConsentRequired { .. } => {
                Self::new(StatusCode::FORBIDDEN, "consent_required", error.to_string())
            }
            ComplianceError::ConsentNotFound { .. } => Self::not_found(error.to_string()),
            ComplianceError::ContactNotFound(_) => Self::not_found(error.to_string()),
            ComplianceError::IntegrityViolation { .. } => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "integrity", error.to_string())
            }
            ComplianceError::Storage(e) => match e {
                StorageError::NotFound { .. } => Self::not_found(error.to_string()),
                StorageError::Conflict(detail) => {
                    Self::new(StatusCode::CONFLICT, "conflict", detail.clone())
                }
                _ => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error"),
            },
        }
    }
}

impl From<TelephonyError> for ApiError {
    fn from(error: TelephonyError) -> Self {
        match &error {
            TelephonyError::SignatureInvalid | TelephonyError::StaleTimestamp => {
                Self::new(StatusCode::FORBIDDEN, "signature_invalid", error.to_string())
            }
            _ => Self::new(StatusCode::BAD_GATEWAY, "provider", error.to_string()),
        }
    }
}

impl From<ServerError> for ApiError {
    fn from(error: ServerError) -> Self {
        match error {
            ServerError::Overloaded => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, "overloaded", error.to_string())
            }
            ServerError::SessionNotFound(id) => Self::not_found(format!("session {}", id)),
            ServerError::TenantNotFound => Self::not_found("tenant"),
            ServerError::Storage(e) => e.into(),
            ServerError::Agent(e) => e.into(),
            ServerError::Telephony(e) => e.into(),
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(error: AgentError) -> Self {
        match error {
            AgentError::SessionEnded => {
                Self::new(StatusCode::CONFLICT, "session_ended", "session has ended")
            }
            AgentError::Job(e) => e.into(),
            AgentError::Storage(e) => e.into(),
            AgentError::Pipeline(e) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "pipeline", e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_race_maps_to_conflict() {
        let error: ApiError = SchedulingError::SlotUnavailable.into();
        assert_eq!(error.status, StatusCode::CONFLICT);
        assert_eq!(error.body.code, "slot_unavailable");
    }

    #[test]
    fn test_consent_required_maps_to_forbidden() {
        let error: ApiError = ComplianceError::ConsentRequired {
            contact: uuid::Uuid::new_v4(),
            kind: "call_recording".to_string(),
        }
        .into();
        assert_eq!(error.status, StatusCode::FORBIDDEN);
        assert_eq!(error.body.code, "consent_required");
    }

    #[test]
    fn test_overloaded_maps_to_429() {
        let error: ApiError = ServerError::Overloaded.into();
        assert_eq!(error.status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_illegal_transition_maps_to_conflict() {
        let error: ApiError = CoreError::IllegalTransition {
            from: "completed".to_string(),
            to: "new".to_string(),
        }
        .into();
        assert_eq!(error.status, StatusCode::CONFLICT);
        assert_eq!(error.body.code, "illegal_transition");
    }
}
