//! Append-only audit ledger with a SHA-256 checksum chain
//!
//! Each row's checksum covers the previous row's checksum, so any mutation of
//! a committed row is detectable by recomputing the chain from genesis. The
//! genesis row chains from the empty string. Appends for one tenant are
//! serialized through a per-tenant writer lock; writers never block other
//! tenants.

use chrono::Utc;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use call_agent_core::TenantId;
use call_agent_storage::{AuditRecord, AuditStore};

use crate::ComplianceError;

/// Result of a full chain verification
#[derive(Debug, Clone, serde::Serialize)]
pub struct IntegrityReport {
    pub rows_checked: usize,
    pub valid: bool,
    /// Sequence number of the first broken row, when invalid
    pub first_broken_seq: Option<u64>,
}

/// Tamper-evident ledger over an [`AuditStore`]
pub struct AuditLedger {
    store: Arc<dyn AuditStore>,
    writer_locks: Mutex<HashMap<TenantId, Arc<tokio::sync::Mutex<()>>>>,
}

impl AuditLedger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            writer_locks: Mutex::new(HashMap::new()),
        }
    }

    fn writer_lock(&self, tenant: TenantId) -> Arc<tokio::sync::Mutex<()>> {
        self.writer_locks
            .lock()
            .entry(tenant)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Append an entry, extending the tenant's checksum chain
    pub async fn append(
        &self,
        tenant: TenantId,
        actor: &str,
        action: &str,
        entity_kind: &str,
        entity_id: Option<String>,
        detail: serde_json::Value,
    ) -> Result<AuditRecord, ComplianceError> {
        let lock = self.writer_lock(tenant);
        let _guard = lock.lock().await;

        let last = self.store.last(tenant).await?;
        let (seq, prev_checksum) = match last {
            Some(row) => (row.seq + 1, row.checksum),
            None => (1, String::new()),
        };

        let mut record = AuditRecord {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            seq,
            timestamp: Utc::now(),
            actor: actor.to_string(),
            action: action.to_string(),
            entity_kind: entity_kind.to_string(),
            entity_id,
            detail,
            prev_checksum,
            checksum: String::new(),
        };
        record.checksum = compute_checksum(&record);

        let stored = self.store.append(record).await?;
        tracing::debug!(
            tenant = %tenant,
            action = %stored.action,
            seq = stored.seq,
            "Audit entry appended"
        );
        Ok(stored)
    }

    /// Recompute checksums from genesis and compare against stored values
    pub async fn verify(&self, tenant: TenantId) -> Result<IntegrityReport, ComplianceError> {
        let rows = self.store.all(tenant).await?;
        let mut prev = String::new();

        for row in &rows {
            if row.prev_checksum != prev {
                return Ok(IntegrityReport {
                    rows_checked: rows.len(),
                    valid: false,
                    first_broken_seq: Some(row.seq),
                });
            }
            let expected = compute_checksum(row);
            if row.checksum != expected {
                return Ok(IntegrityReport {
                    rows_checked: rows.len(),
                    valid: false,
                    first_broken_seq: Some(row.seq),
                });
            }
            prev = row.checksum.clone();
        }

        Ok(IntegrityReport {
            rows_checked: rows.len(),
            valid: true,
            first_broken_seq: None,
        })
    }

    /// Query rows for one entity, ordered by sequence
    pub async fn for_entity(
        &self,
        tenant: TenantId,
        entity_kind: &str,
        entity_id: Option<&str>,
    ) -> Result<Vec<AuditRecord>, ComplianceError> {
        Ok(self.store.for_entity(tenant, entity_kind, entity_id).await?)
    }

    /// All rows of a tenant
    pub async fn all(&self, tenant: TenantId) -> Result<Vec<AuditRecord>, ComplianceError> {
        Ok(self.store.all(tenant).await?)
    }
}

/// Checksum over the previous checksum and the row's canonical fields.
///
/// The timestamp is normalized to RFC 3339 UTC so the digest is stable
/// regardless of how the row was deserialized.
fn compute_checksum(record: &AuditRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.prev_checksum.as_bytes());
    hasher.update(record.seq.to_be_bytes());
    hasher.update(record.tenant_id.to_string().as_bytes());
    hasher.update(record.timestamp.to_rfc3339().as_bytes());
    hasher.update(record.actor.as_bytes());
    hasher.update(record.action.as_bytes());
    hasher.update(record.entity_kind.as_bytes());
    if let Some(ref id) = record.entity_id {
        hasher.update(id.as_bytes());
    }
    hasher.update(record.detail.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
