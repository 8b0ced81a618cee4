//! Department and worker store

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use call_agent_core::{Department, TenantId, TradeCategory, Worker};

use crate::StorageError;

#[async_trait]
pub trait WorkforceStore: Send + Sync {
    async fn create_department(&self, dept: Department) -> Result<Department, StorageError>;
    async fn get_department(
        &self,
        tenant: TenantId,
        id: Uuid,
    ) -> Result<Option<Department>, StorageError>;
    async fn list_departments(&self, tenant: TenantId) -> Result<Vec<Department>, StorageError>;
    /// Active departments accepting the given trade
    async fn departments_for_trade(
        &self,
        tenant: TenantId,
        trade: TradeCategory,
    ) -> Result<Vec<Department>, StorageError>;

    async fn create_worker(&self, worker: Worker) -> Result<Worker, StorageError>;
    async fn get_worker(&self, tenant: TenantId, id: Uuid) -> Result<Option<Worker>, StorageError>;
    async fn update_worker(&self, worker: Worker) -> Result<(), StorageError>;
    /// Workers of one department; pass None for all departments of the tenant
    async fn list_workers(
        &self,
        tenant: TenantId,
        department: Option<Uuid>,
    ) -> Result<Vec<Worker>, StorageError>;
}

/// In-memory workforce store
pub struct MemoryWorkforceStore {
    departments: RwLock<HashMap<Uuid, Department>>,
    workers: RwLock<HashMap<Uuid, Worker>>,
}

impl MemoryWorkforceStore {
    pub fn new() -> Self {
        Self {
            departments: RwLock::new(HashMap::new()),
            workers: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryWorkforceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkforceStore for MemoryWorkforceStore {
    async fn create_department(&self, dept: Department) -> Result<Department, StorageError> {
        self.departments.write().insert(dept.id, dept.clone());
        Ok(dept)
    }

    async fn get_department(
        &self,
        tenant: TenantId,
        id: Uuid,
    ) -> Result<Option<Department>, StorageError> {
        Ok(self
            .departments
            .read()
            .get(&id)
            .filter(|d| d.tenant_id == tenant)
            .cloned())
    }

    async fn list_departments(&self, tenant: TenantId) -> Result<Vec<Department>, StorageError> {
        Ok(self
            .departments
            .read()
            .values()
            .filter(|d| d.tenant_id == tenant)
            .cloned()
            .collect())
    }

    async fn departments_for_trade(
        &self,
        tenant: TenantId,
        trade: TradeCategory,
    ) -> Result<Vec<Department>, StorageError> {
        Ok(self
            .departments
            .read()
            .values()
            .filter(|d| d.tenant_id == tenant && d.active && d.handles_trade(trade))
            .cloned()
            .collect())
    }

    async fn create_worker(&self, worker: Worker) -> Result<Worker, StorageError> {
        self.workers.write().insert(worker.id, worker.clone());
        Ok(worker)
    }

    async fn get_worker(&self, tenant: TenantId, id: Uuid) -> Result<Option<Worker>, StorageError> {
        Ok(self
            .workers
            .read()
            .get(&id)
            .filter(|w| w.tenant_id == tenant)
            .cloned())
    }

    async fn update_worker(&self, worker: Worker) -> Result<(), StorageError> {
        let mut workers = self.workers.write();
        match workers.get(&worker.id) {
            Some(existing) if existing.tenant_id == worker.tenant_id => {
                workers.insert(worker.id, worker);
                Ok(())
            }
            _ => Err(StorageError::not_found("worker", worker.id)),
        }
    }

    async fn list_workers(
        &self,
        tenant: TenantId,
        department: Option<Uuid>,
    ) -> Result<Vec<Worker>, StorageError> {
        Ok(self
            .workers
            .read()
            .values()
            .filter(|w| {
                w.tenant_id == tenant && department.map(|d| w.department_id == d).unwrap_or(true)
            })
            .cloned()
            .collect())
    }
}
