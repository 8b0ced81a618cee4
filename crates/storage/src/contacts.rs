//! Contact store

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use call_agent_core::{Contact, TenantId};

use crate::StorageError;

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn create(&self, contact: Contact) -> Result<Contact, StorageError>;
    async fn get(&self, tenant: TenantId, id: Uuid) -> Result<Option<Contact>, StorageError>;
    async fn update(&self, contact: Contact) -> Result<(), StorageError>;
    /// Find by E.164 phone number within the tenant
    async fn find_by_phone(
        &self,
        tenant: TenantId,
        phone: &str,
    ) -> Result<Option<Contact>, StorageError>;
    /// All contacts of a tenant, excluding soft-deleted unless requested
    async fn list(
        &self,
        tenant: TenantId,
        include_deleted: bool,
    ) -> Result<Vec<Contact>, StorageError>;
}

/// In-memory contact store
pub struct MemoryContactStore {
    contacts: RwLock<HashMap<Uuid, Contact>>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self {
            contacts: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryContactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn create(&self, contact: Contact) -> Result<Contact, StorageError> {
        let mut contacts = self.contacts.write();
        if contacts.contains_key(&contact.id) {
            return Err(StorageError::Conflict(format!("contact {}", contact.id)));
        }
        contacts.insert(contact.id, contact.clone());
        Ok(contact)
    }

    async fn get(&self, tenant: TenantId, id: Uuid) -> Result<Option<Contact>, StorageError> {
        Ok(self
            .contacts
            .read()
            .get(&id)
            .filter(|c| c.tenant_id == tenant)
            .cloned())
    }

    async fn update(&self, contact: Contact) -> Result<(), StorageError> {
        let mut contacts = self.contacts.write();
        match contacts.get(&contact.id) {
            Some(existing) if existing.tenant_id == contact.tenant_id => {
                contacts.insert(contact.id, contact);
                Ok(())
            }
            _ => Err(StorageError::not_found("contact", contact.id)),
        }
    }

    async fn find_by_phone(
        &self,
        tenant: TenantId,
        phone: &str,
    ) -> Result<Option<Contact>, StorageError> {
        Ok(self
            .contacts
            .read()
            .values()
            .find(|c| c.tenant_id == tenant && c.phone == phone && !c.is_deleted())
            .cloned())
    }

    async fn list(
        &self,
        tenant: TenantId,
        include_deleted: bool,
    ) -> Result<Vec<Contact>, StorageError> {
        Ok(self
            .contacts
            .read()
            .values()
            .filter(|c| c.tenant_id == tenant && (include_deleted || !c.is_deleted()))
            .cloned()
            .collect())
    }
}
