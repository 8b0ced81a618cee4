//! Storage adapter for the call agent
//!
//! Provides tenant-scoped store traits and in-memory implementations for:
//! - Tenants, contacts
//! - Jobs and job history
//! - Departments, workers, routing rules
//! - Calendar entries (bookings and blocked intervals)
//! - Consent records and audit rows
//! - Session summaries
//!
//! Every query is scoped by tenant id; an entity belonging to a different
//! tenant behaves exactly like a missing entity.

pub mod audit;
pub mod calendar;
pub mod consents;
pub mod contacts;
pub mod error;
pub mod jobs;
pub mod rules;
pub mod summaries;
pub mod tenants;
pub mod workforce;

pub use audit::{AuditRecord, AuditStore, MemoryAuditStore};
pub use calendar::{CalendarEntry, CalendarEntryKind, CalendarStore, MemoryCalendarStore};
pub use consents::{ConsentKind, ConsentMethod, ConsentRecord, ConsentStore, MemoryConsentStore};
pub use contacts::{ContactStore, MemoryContactStore};
pub use error::StorageError;
pub use jobs::{JobFilter, JobStore, MemoryJobStore};
pub use rules::{MemoryRuleStore, RuleStore};
pub use summaries::{MemorySummaryStore, SessionOutcome, SessionSummary, SummaryStore};
pub use tenants::{MemoryTenantStore, TenantStore};
pub use workforce::{MemoryWorkforceStore, WorkforceStore};

use std::sync::Arc;

/// Combined storage layer with all stores
#[derive(Clone)]
pub struct Storage {
    pub tenants: Arc<dyn TenantStore>,
    pub contacts: Arc<dyn ContactStore>,
    pub jobs: Arc<dyn JobStore>,
    pub workforce: Arc<dyn WorkforceStore>,
    pub rules: Arc<dyn RuleStore>,
    pub calendar: Arc<dyn CalendarStore>,
    pub consents: Arc<dyn ConsentStore>,
    pub audit: Arc<dyn AuditStore>,
    pub summaries: Arc<dyn SummaryStore>,
}

impl Storage {
    /// In-memory storage, one fresh instance per service graph
    pub fn in_memory() -> Self {
        Self {
            tenants: Arc::new(MemoryTenantStore::new()),
            contacts: Arc::new(MemoryContactStore::new()),
            jobs: Arc::new(MemoryJobStore::new()),
            workforce: Arc::new(MemoryWorkforceStore::new()),
            rules: Arc::new(MemoryRuleStore::new()),
            calendar: Arc::new(MemoryCalendarStore::new()),
            consents: Arc::new(MemoryConsentStore::new()),
            audit: Arc::new(MemoryAuditStore::new()),
            summaries: Arc::new(MemorySummaryStore::new()),
        }
    }
}
