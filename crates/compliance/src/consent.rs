//! Consent management
//!
//! Grants and revocations are appended to the consent store and mirrored
//! into the audit ledger in the same call; an operation without a durable
//! audit row must not become visible.

use std::sync::Arc;
use uuid::Uuid;

use call_agent_core::TenantId;
use call_agent_storage::{ConsentKind, ConsentMethod, ConsentRecord, ConsentStore};

use crate::{AuditLedger, ComplianceError};

/// Consent service
pub struct ConsentManager {
    store: Arc<dyn ConsentStore>,
    ledger: Arc<AuditLedger>,
}

impl ConsentManager {
    pub fn new(store: Arc<dyn ConsentStore>, ledger: Arc<AuditLedger>) -> Self {
        Self { store, ledger }
    }

    /// Record a consent grant with its audit entry
    pub async fn grant(
        &self,
        tenant: TenantId,
        contact: Uuid,
        kind: ConsentKind,
        method: ConsentMethod,
        call_id: Option<Uuid>,
    ) -> Result<ConsentRecord, ComplianceError> {
        let mut record = ConsentRecord::grant(tenant, contact, kind, method);
        record.call_id = call_id;

        let stored = self.store.append(record).await?;

        self.ledger
            .append(
                tenant,
                "system",
                "consent_granted",
                "consent",
                Some(stored.id.to_string()),
                serde_json::json!({
                    "contact_id": contact,
                    "kind": kind.as_str(),
                }),
            )
            .await?;

        tracing::info!(
            tenant = %tenant,
            contact = %contact,
            kind = kind.as_str(),
            "Consent granted"
        );
        Ok(stored)
    }

    /// Revoke the active consent. The prior record is closed, never deleted.
    pub async fn revoke(
        &self,
        tenant: TenantId,
        contact: Uuid,
        kind: ConsentKind,
    ) -> Result<ConsentRecord, ComplianceError> {
        let revoked = self.store.revoke(tenant, contact, kind).await?.ok_or(
            ComplianceError::ConsentNotFound {
                contact,
                kind: kind.as_str().to_string(),
            },
        )?;

        self.ledger
            .append(
                tenant,
                "system",
                "consent_revoked",
                "consent",
                Some(revoked.id.to_string()),
                serde_json::json!({
                    "contact_id": contact,
                    "kind": kind.as_str(),
                }),
            )
            .await?;

        tracing::info!(
            tenant = %tenant,
            contact = %contact,
            kind = kind.as_str(),
            "Consent revoked"
        );
        Ok(revoked)
    }

    /// Check whether an active consent exists
    pub async fn is_granted(
        &self,
        tenant: TenantId,
        contact: Uuid,
        kind: ConsentKind,
    ) -> Result<bool, ComplianceError> {
        Ok(self.store.active(tenant, contact, kind).await?.is_some())
    }

    /// Gate an operation on consent; errors with `ConsentRequired` if missing
    pub async fn require(
        &self,
        tenant: TenantId,
        contact: Uuid,
        kind: ConsentKind,
    ) -> Result<(), ComplianceError> {
        if self.is_granted(tenant, contact, kind).await? {
            Ok(())
        } else {
            Err(ComplianceError::ConsentRequired {
                contact,
                kind: kind.as_str().to_string(),
            })
        }
    }

    /// Full consent history of a contact
    pub async fn records_for(
        &self,
        tenant: TenantId,
        contact: Uuid,
    ) -> Result<Vec<ConsentRecord>, ComplianceError> {
        Ok(self.store.records_for(tenant, contact).await?)
    }
}
