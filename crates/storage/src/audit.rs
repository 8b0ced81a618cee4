//! Audit row store
//!
//! Rows are append-only and carry the checksum chain computed by the
//! compliance ledger. The store itself never mutates existing rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use call_agent_core::TenantId;

use crate::StorageError;

/// One ledger row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub tenant_id: TenantId,
    /// Per-tenant monotonic sequence
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub entity_kind: String,
    pub entity_id: Option<String>,
    pub detail: serde_json::Value,
    pub prev_checksum: String,
    pub checksum: String,
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append a row. The caller supplies the computed checksum chain; the
    /// store rejects rows whose seq is not exactly last seq + 1.
    async fn append(&self, record: AuditRecord) -> Result<AuditRecord, StorageError>;

    /// The most recent row of a tenant, if any
    async fn last(&self, tenant: TenantId) -> Result<Option<AuditRecord>, StorageError>;

    /// All rows of a tenant, ordered by seq
    async fn all(&self, tenant: TenantId) -> Result<Vec<AuditRecord>, StorageError>;

    /// Rows matching an entity kind and optional entity id, ordered by seq
    async fn for_entity(
        &self,
        tenant: TenantId,
        entity_kind: &str,
        entity_id: Option<&str>,
    ) -> Result<Vec<AuditRecord>, StorageError>;
}

/// In-memory audit store
pub struct MemoryAuditStore {
    rows: RwLock<HashMap<TenantId, Vec<AuditRecord>>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, record: AuditRecord) -> Result<AuditRecord, StorageError> {
        let mut rows = self.rows.write();
        let chain = rows.entry(record.tenant_id).or_default();

        let expected_seq = chain.last().map(|r| r.seq + 1).unwrap_or(1);
        if record.seq != expected_seq {
            return Err(StorageError::InvalidData(format!(
                "audit seq {} out of order, expected {}",
                record.seq, expected_seq
            )));
        }

        chain.push(record.clone());
        Ok(record)
    }

    async fn last(&self, tenant: TenantId) -> Result<Option<AuditRecord>, StorageError> {
        Ok(self
            .rows
            .read()
            .get(&tenant)
            .and_then(|chain| chain.last().cloned()))
    }

    async fn all(&self, tenant: TenantId) -> Result<Vec<AuditRecord>, StorageError> {
        Ok(self.rows.read().get(&tenant).cloned().unwrap_or_default())
    }

    async fn for_entity(
        &self,
        tenant: TenantId,
        entity_kind: &str,
        entity_id: Option<&str>,
    ) -> Result<Vec<AuditRecord>, StorageError> {
        Ok(self
            .rows
            .read()
            .get(&tenant)
            .map(|chain| {
                chain
                    .iter()
                    .filter(|r| {
                        r.entity_kind == entity_kind
                            && entity_id
                                .map(|id| r.entity_id.as_deref() == Some(id))
                                .unwrap_or(true)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tenant: TenantId, seq: u64) -> AuditRecord {
        AuditRecord {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            seq,
            timestamp: Utc::now(),
            actor: "system".to_string(),
            action: "test".to_string(),
            entity_kind: "job".to_string(),
            entity_id: None,
            detail: serde_json::Value::Null,
            prev_checksum: String::new(),
            checksum: "abc".to_string(),
        }
    }

    #[tokio::test]
    async fn test_seq_must_be_contiguous() {
        let store = MemoryAuditStore::new();
        let tenant = TenantId::new();

        store.append(record(tenant, 1)).await.unwrap();
        store.append(record(tenant, 2)).await.unwrap();
        assert!(store.append(record(tenant, 4)).await.is_err());
    }

    #[tokio::test]
    async fn test_chains_independent_per_tenant() {
        let store = MemoryAuditStore::new();
        let a = TenantId::new();
        let b = TenantId::new();

        store.append(record(a, 1)).await.unwrap();
        store.append(record(b, 1)).await.unwrap();

        assert_eq!(store.all(a).await.unwrap().len(), 1);
        assert_eq!(store.all(b).await.unwrap().len(), 1);
    }
}
