//! Consent management and the tamper-evident audit ledger
//!
//! Two logs exist on purpose: job history is per-job and user-visible, the
//! audit ledger is tenant-wide and compliance-facing. Compliance-relevant
//! events (consent changes, erasure) are written to both by their services.

pub mod audit;
pub mod consent;
pub mod erasure;
pub mod retention;

pub use audit::{AuditLedger, IntegrityReport};
pub use consent::ConsentManager;
pub use erasure::{ContactExport, ErasureService};
pub use retention::{RetentionPolicy, RetentionSweeper, SweepReport};

use thiserror::Error;

/// Compliance errors
#[derive(Error, Debug)]
pub enum ComplianceError {
    #[error("Storage error: {0}")]
    Storage(#[from] call_agent_storage::StorageError),

    #[error("Consent required: {kind} not granted for contact {contact}")]
    ConsentRequired { contact: uuid::Uuid, kind: String },

    #[error("Consent not found: {kind} for contact {contact}")]
    ConsentNotFound { contact: uuid::Uuid, kind: String },

    #[error("Audit chain integrity violation at seq {seq}: {message}")]
    IntegrityViolation { seq: u64, message: String },

    #[error("Contact not found: {0}")]
    ContactNotFound(uuid::Uuid),
}
