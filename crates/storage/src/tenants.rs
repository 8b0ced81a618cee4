//! Tenant store

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use call_agent_core::{Tenant, TenantId};

use crate::StorageError;

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn create(&self, tenant: Tenant) -> Result<Tenant, StorageError>;
    async fn get(&self, id: TenantId) -> Result<Option<Tenant>, StorageError>;
    async fn update(&self, tenant: Tenant) -> Result<(), StorageError>;
    async fn list_active(&self) -> Result<Vec<Tenant>, StorageError>;
}

/// In-memory tenant store
pub struct MemoryTenantStore {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl MemoryTenantStore {
    pub fn new() -> Self {
        Self {
            tenants: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryTenantStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn create(&self, tenant: Tenant) -> Result<Tenant, StorageError> {
        let mut tenants = self.tenants.write();
        if tenants.contains_key(&tenant.id) {
            return Err(StorageError::Conflict(format!("tenant {}", tenant.id)));
        }
        tenants.insert(tenant.id, tenant.clone());
        tracing::debug!(tenant_id = %tenant.id, "Tenant created");
        Ok(tenant)
    }

    async fn get(&self, id: TenantId) -> Result<Option<Tenant>, StorageError> {
        Ok(self.tenants.read().get(&id).cloned())
    }

    async fn update(&self, tenant: Tenant) -> Result<(), StorageError> {
        let mut tenants = self.tenants.write();
        if !tenants.contains_key(&tenant.id) {
            return Err(StorageError::TenantNotFound(tenant.id.to_string()));
        }
        tenants.insert(tenant.id, tenant);
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Tenant>, StorageError> {
        Ok(self
            .tenants
            .read()
            .values()
            .filter(|t| t.active)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryTenantStore::new();
        let tenant = Tenant::new("Mustermann Haustechnik");
        let id = tenant.id;

        store.create(tenant).await.unwrap();
        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Mustermann Haustechnik");
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let store = MemoryTenantStore::new();
        let tenant = Tenant::new("A");
        store.create(tenant.clone()).await.unwrap();
        assert!(store.create(tenant).await.is_err());
    }
}
