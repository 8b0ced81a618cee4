//! Data retention sweep
//!
//! Applies per-entity retention windows: contacts with no activity beyond
//! their window are anonymized, expired session summaries are pruned. Every
//! affected entity gets an audit entry.

use chrono::{Duration, Utc};
use std::sync::Arc;

use call_agent_core::TenantId;
use call_agent_storage::{ContactStore, SummaryStore};

use crate::{AuditLedger, ComplianceError};

/// Retention windows in days per entity kind
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub contact_days: i64,
    pub session_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            contact_days: 365 * 3,
            session_days: 90,
        }
    }
}

/// Result of one sweep
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SweepReport {
    pub contacts_anonymized: usize,
    pub summaries_pruned: usize,
}

/// Periodic retention sweeper
pub struct RetentionSweeper {
    contacts: Arc<dyn ContactStore>,
    summaries: Arc<dyn SummaryStore>,
    ledger: Arc<AuditLedger>,
    policy: RetentionPolicy,
}

impl RetentionSweeper {
    pub fn new(
        contacts: Arc<dyn ContactStore>,
        summaries: Arc<dyn SummaryStore>,
        ledger: Arc<AuditLedger>,
        policy: RetentionPolicy,
    ) -> Self {
        Self {
            contacts,
            summaries,
            ledger,
            policy,
        }
    }

    /// Run one sweep for a tenant
    pub async fn sweep(&self, tenant: TenantId) -> Result<SweepReport, ComplianceError> {
        let mut report = SweepReport::default();
        let now = Utc::now();

        let contact_cutoff = now - Duration::days(self.policy.contact_days);
        for contact in self.contacts.list(tenant, false).await? {
            if contact.updated_at < contact_cutoff {
                let mut scrubbed = contact.clone();
                scrubbed.anonymize();
                self.contacts.update(scrubbed).await?;

                self.ledger
                    .append(
                        tenant,
                        "system",
                        "retention_anonymized",
                        "contact",
                        Some(contact.id.to_string()),
                        serde_json::json!({ "window_days": self.policy.contact_days }),
                    )
                    .await?;
                report.contacts_anonymized += 1;
            }
        }

        let session_cutoff = now - Duration::days(self.policy.session_days);
        let pruned = self.summaries.prune_before(tenant, session_cutoff).await?;
        if pruned > 0 {
            self.ledger
                .append(
                    tenant,
                    "system",
                    "retention_pruned",
                    "session_summary",
                    None,
                    serde_json::json!({ "count": pruned }),
                )
                .await?;
        }
        report.summaries_pruned = pruned;

        if report.contacts_anonymized > 0 || report.summaries_pruned > 0 {
            tracing::info!(
                tenant = %tenant,
                contacts = report.contacts_anonymized,
                summaries = report.summaries_pruned,
                "Retention sweep applied"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_agent_core::Contact;
    use call_agent_storage::{MemoryAuditStore, MemoryContactStore, MemorySummaryStore};

    #[tokio::test]
    async fn test_sweep_anonymizes_stale_contacts() {
        let contacts = Arc::new(MemoryContactStore::new());
        let summaries = Arc::new(MemorySummaryStore::new());
        let ledger = Arc::new(AuditLedger::new(Arc::new(MemoryAuditStore::new())));
        let tenant = TenantId::new();

        let mut stale = Contact::new(tenant, "Alt", "+491000000");
        stale.updated_at = Utc::now() - Duration::days(400);
        contacts.create(stale).await.unwrap();
        contacts
            .create(Contact::new(tenant, "Neu", "+491111111"))
            .await
            .unwrap();

        let sweeper = RetentionSweeper::new(
            contacts.clone(),
            summaries,
            ledger.clone(),
            RetentionPolicy {
                contact_days: 365,
                session_days: 90,
            },
        );

        let report = sweeper.sweep(tenant).await.unwrap();
        assert_eq!(report.contacts_anonymized, 1);
        assert!(ledger.verify(tenant).await.unwrap().valid);
    }
}
