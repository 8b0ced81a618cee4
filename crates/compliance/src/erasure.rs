//! Data portability and right-to-erasure
//!
//! Export gathers everything linked to a contact. Erasure anonymizes the
//! contact and scrubs linked jobs and summaries while keeping keys for
//! referential integrity; prior audit rows stay untouched and the chain
//! remains valid.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use call_agent_core::{Contact, Job, JobHistoryEntry, TenantId};
use call_agent_storage::{
    ConsentRecord, ConsentStore, ContactStore, JobFilter, JobStore, SessionSummary, SummaryStore,
};

use crate::{AuditLedger, ComplianceError};

/// Everything stored about one contact
#[derive(Debug, Serialize)]
pub struct ContactExport {
    pub contact: Contact,
    pub jobs: Vec<Job>,
    pub consents: Vec<ConsentRecord>,
    pub sessions: Vec<SessionSummary>,
}

/// Export and erasure operations
pub struct ErasureService {
    contacts: Arc<dyn ContactStore>,
    jobs: Arc<dyn JobStore>,
    consents: Arc<dyn ConsentStore>,
    summaries: Arc<dyn SummaryStore>,
    ledger: Arc<AuditLedger>,
}

impl ErasureService {
    pub fn new(
        contacts: Arc<dyn ContactStore>,
        jobs: Arc<dyn JobStore>,
        consents: Arc<dyn ConsentStore>,
        summaries: Arc<dyn SummaryStore>,
        ledger: Arc<AuditLedger>,
    ) -> Self {
        Self {
            contacts,
            jobs,
            consents,
            summaries,
            ledger,
        }
    }

    /// Collect all data linked to a contact for portability
    pub async fn export(
        &self,
        tenant: TenantId,
        contact_id: Uuid,
    ) -> Result<ContactExport, ComplianceError> {
        let contact = self
            .contacts
            .get(tenant, contact_id)
            .await?
            .ok_or(ComplianceError::ContactNotFound(contact_id))?;

        let filter = JobFilter {
            contact_id: Some(contact_id),
            ..Default::default()
        };
        let jobs = self.jobs.list(tenant, &filter).await?;
        let consents = self.consents.records_for(tenant, contact_id).await?;
        let sessions = self.summaries.for_contact(tenant, contact_id).await?;

        self.ledger
            .append(
                tenant,
                "system",
                "data_exported",
                "contact",
                Some(contact_id.to_string()),
                serde_json::json!({ "jobs": jobs.len(), "sessions": sessions.len() }),
            )
            .await?;

        Ok(ContactExport {
            contact,
            jobs,
            consents,
            sessions,
        })
    }

    /// Execute right-to-erasure for a contact
    pub async fn erase(
        &self,
        tenant: TenantId,
        contact_id: Uuid,
    ) -> Result<usize, ComplianceError> {
        let mut contact = self
            .contacts
            .get(tenant, contact_id)
            .await?
            .ok_or(ComplianceError::ContactNotFound(contact_id))?;

        let mut scrubbed = 0;

        contact.anonymize();
        self.contacts.update(contact).await?;
        scrubbed += 1;

        // Scrub personal fields on linked jobs, keeping ids and numbers
        let filter = JobFilter {
            contact_id: Some(contact_id),
            ..Default::default()
        };
        for mut job in self.jobs.list(tenant, &filter).await? {
            job.address = None;
            job.access_notes = None;
            let history = JobHistoryEntry::new(job.id, "system", "erasure_scrubbed");
            self.jobs.update(job, history).await?;
            scrubbed += 1;
        }

        scrubbed += self.summaries.anonymize_contact(tenant, contact_id).await?;

        self.ledger
            .append(
                tenant,
                "system",
                "erasure_executed",
                "contact",
                Some(contact_id.to_string()),
                serde_json::json!({ "entities_scrubbed": scrubbed }),
            )
            .await?;

        tracing::info!(
            tenant = %tenant,
            contact = %contact_id,
            scrubbed,
            "Right-to-erasure executed"
        );
        Ok(scrubbed)
    }
}
