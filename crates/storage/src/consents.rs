//! Consent record store
//!
//! Records are append-only: a revocation closes the active record instead of
//! deleting it, and granting again creates a new row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use call_agent_core::TenantId;

use crate::StorageError;

/// What the consent covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentKind {
    DataProcessing,
    CallRecording,
    Reminders,
    Marketing,
}

impl ConsentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentKind::DataProcessing => "data_processing",
            ConsentKind::CallRecording => "call_recording",
            ConsentKind::Reminders => "reminders",
            ConsentKind::Marketing => "marketing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "data_processing" => Some(ConsentKind::DataProcessing),
            // Original naming kept as an accepted alias
            "call_recording" | "voice_recording" => Some(ConsentKind::CallRecording),
            "reminders" => Some(ConsentKind::Reminders),
            "marketing" => Some(ConsentKind::Marketing),
            _ => None,
        }
    }
}

/// How consent was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentMethod {
    Verbal,
    Written,
    Digital,
}

/// One grant or revocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub contact_id: Uuid,
    pub kind: ConsentKind,
    pub method: ConsentMethod,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Call during which consent was given, if any
    pub call_id: Option<Uuid>,
}

impl ConsentRecord {
    pub fn grant(
        tenant_id: TenantId,
        contact_id: Uuid,
        kind: ConsentKind,
        method: ConsentMethod,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            contact_id,
            kind,
            method,
            granted_at: Utc::now(),
            revoked_at: None,
            expires_at: None,
            call_id: None,
        }
    }

    /// Active at the given instant
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        if self.granted_at > at {
            return false;
        }
        if let Some(revoked) = self.revoked_at {
            if revoked <= at {
                return false;
            }
        }
        if let Some(expires) = self.expires_at {
            if expires <= at {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait ConsentStore: Send + Sync {
    async fn append(&self, record: ConsentRecord) -> Result<ConsentRecord, StorageError>;
    /// Mark the active record for (contact, kind) revoked; returns it, or None
    async fn revoke(
        &self,
        tenant: TenantId,
        contact: Uuid,
        kind: ConsentKind,
    ) -> Result<Option<ConsentRecord>, StorageError>;
    /// All records for a contact, newest first
    async fn records_for(
        &self,
        tenant: TenantId,
        contact: Uuid,
    ) -> Result<Vec<ConsentRecord>, StorageError>;
    /// The currently active record for (contact, kind), if any
    async fn active(
        &self,
        tenant: TenantId,
        contact: Uuid,
        kind: ConsentKind,
    ) -> Result<Option<ConsentRecord>, StorageError>;
}

/// In-memory consent store
pub struct MemoryConsentStore {
    records: RwLock<Vec<ConsentRecord>>,
}

impl MemoryConsentStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryConsentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConsentStore for MemoryConsentStore {
    async fn append(&self, record: ConsentRecord) -> Result<ConsentRecord, StorageError> {
        let mut records = self.records.write();

        // At most one active record per (contact, kind)
        let now = Utc::now();
        let has_active = records.iter().any(|r| {
            r.tenant_id == record.tenant_id
                && r.contact_id == record.contact_id
                && r.kind == record.kind
                && r.is_active_at(now)
        });
        if has_active {
            return Err(StorageError::Conflict(format!(
                "active {} consent exists for contact {}",
                record.kind.as_str(),
                record.contact_id
            )));
        }

        records.push(record.clone());
        Ok(record)
    }

    async fn revoke(
        &self,
        tenant: TenantId,
        contact: Uuid,
        kind: ConsentKind,
    ) -> Result<Option<ConsentRecord>, StorageError> {
        let mut records = self.records.write();
        let now = Utc::now();

        for record in records.iter_mut() {
            if record.tenant_id == tenant
                && record.contact_id == contact
                && record.kind == kind
                && record.is_active_at(now)
            {
                record.revoked_at = Some(now);
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    async fn records_for(
        &self,
        tenant: TenantId,
        contact: Uuid,
    ) -> Result<Vec<ConsentRecord>, StorageError> {
        let mut found: Vec<ConsentRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| r.tenant_id == tenant && r.contact_id == contact)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.granted_at.cmp(&a.granted_at));
        Ok(found)
    }

    async fn active(
        &self,
        tenant: TenantId,
        contact: Uuid,
        kind: ConsentKind,
    ) -> Result<Option<ConsentRecord>, StorageError> {
        let now = Utc::now();
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| {
                r.tenant_id == tenant
                    && r.contact_id == contact
                    && r.kind == kind
                    && r.is_active_at(now)
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_grant_revoke_keeps_history() {
        let store = MemoryConsentStore::new();
        let tenant = TenantId::new();
        let contact = Uuid::new_v4();

        store
            .append(ConsentRecord::grant(
                tenant,
                contact,
                ConsentKind::CallRecording,
                ConsentMethod::Verbal,
            ))
            .await
            .unwrap();

        let revoked = store
            .revoke(tenant, contact, ConsentKind::CallRecording)
            .await
            .unwrap();
        assert!(revoked.is_some());

        // Record still present, just closed
        let records = store.records_for(tenant, contact).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].revoked_at.is_some());

        assert!(store
            .active(tenant, contact, ConsentKind::CallRecording)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_single_active_per_kind() {
        let store = MemoryConsentStore::new();
        let tenant = TenantId::new();
        let contact = Uuid::new_v4();

        store
            .append(ConsentRecord::grant(
                tenant,
                contact,
                ConsentKind::Reminders,
                ConsentMethod::Digital,
            ))
            .await
            .unwrap();

        let second = ConsentRecord::grant(
            tenant,
            contact,
            ConsentKind::Reminders,
            ConsentMethod::Digital,
        );
        assert!(store.append(second).await.is_err());
    }

    #[test]
    fn test_kind_alias_parse() {
        assert_eq!(
            ConsentKind::parse("voice_recording"),
            Some(ConsentKind::CallRecording)
        );
        assert_eq!(ConsentKind::parse("unknown"), None);
    }
}
