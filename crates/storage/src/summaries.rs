//! Session summary store
//!
//! Sessions are transient; a summary row is written at session end.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use call_agent_core::TenantId;

use crate::StorageError;

/// How the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    Abandoned,
    Escalated,
    Transferred,
    Error,
}

/// Persisted summary of one finished session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub session_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub channel: String,
    pub outcome: SessionOutcome,
    pub job_id: Option<Uuid>,
    pub turn_count: u32,
    pub duration_s: u64,
    pub escalated: bool,
    pub transcript: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn append(&self, summary: SessionSummary) -> Result<(), StorageError>;
    async fn list(&self, tenant: TenantId) -> Result<Vec<SessionSummary>, StorageError>;
    async fn for_contact(
        &self,
        tenant: TenantId,
        contact: Uuid,
    ) -> Result<Vec<SessionSummary>, StorageError>;
    /// Remove summaries older than the cutoff; returns removed count
    async fn prune_before(
        &self,
        tenant: TenantId,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StorageError>;
    /// Detach summaries from an erased contact and scrub transcripts
    async fn anonymize_contact(
        &self,
        tenant: TenantId,
        contact: Uuid,
    ) -> Result<usize, StorageError>;
}

/// In-memory summary store
pub struct MemorySummaryStore {
    summaries: RwLock<Vec<SessionSummary>>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self {
            summaries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemorySummaryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SummaryStore for MemorySummaryStore {
    async fn append(&self, summary: SessionSummary) -> Result<(), StorageError> {
        self.summaries.write().push(summary);
        Ok(())
    }

    async fn list(&self, tenant: TenantId) -> Result<Vec<SessionSummary>, StorageError> {
        Ok(self
            .summaries
            .read()
            .iter()
            .filter(|s| s.tenant_id == tenant)
            .cloned()
            .collect())
    }

    async fn for_contact(
        &self,
        tenant: TenantId,
        contact: Uuid,
    ) -> Result<Vec<SessionSummary>, StorageError> {
        Ok(self
            .summaries
            .read()
            .iter()
            .filter(|s| s.tenant_id == tenant && s.contact_id == Some(contact))
            .cloned()
            .collect())
    }

    async fn prune_before(
        &self,
        tenant: TenantId,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let mut summaries = self.summaries.write();
        let before = summaries.len();
        summaries.retain(|s| s.tenant_id != tenant || s.created_at >= cutoff);
        Ok(before - summaries.len())
    }

    async fn anonymize_contact(
        &self,
        tenant: TenantId,
        contact: Uuid,
    ) -> Result<usize, StorageError> {
        let mut summaries = self.summaries.write();
        let mut touched = 0;
        for summary in summaries.iter_mut() {
            if summary.tenant_id == tenant && summary.contact_id == Some(contact) {
                summary.contact_id = None;
                summary.transcript = "[gelöscht]".to_string();
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn summary(tenant: TenantId, contact: Option<Uuid>) -> SessionSummary {
        SessionSummary {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            session_id: Uuid::new_v4(),
            contact_id: contact,
            channel: "phone".to_string(),
            outcome: SessionOutcome::Completed,
            job_id: None,
            turn_count: 6,
            duration_s: 120,
            escalated: false,
            transcript: "user: Hallo".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_prune() {
        let store = MemorySummaryStore::new();
        let tenant = TenantId::new();

        let mut old = summary(tenant, None);
        old.created_at = Utc::now() - Duration::days(120);
        store.append(old).await.unwrap();
        store.append(summary(tenant, None)).await.unwrap();

        let removed = store
            .prune_before(tenant, Utc::now() - Duration::days(90))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.list(tenant).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_anonymize_contact() {
        let store = MemorySummaryStore::new();
        let tenant = TenantId::new();
        let contact = Uuid::new_v4();

        store.append(summary(tenant, Some(contact))).await.unwrap();
        let touched = store.anonymize_contact(tenant, contact).await.unwrap();

        assert_eq!(touched, 1);
        let all = store.list(tenant).await.unwrap();
        assert!(all[0].contact_id.is_none());
        assert_eq!(all[0].transcript, "[gelöscht]");
    }
}
