//! Routing rule store

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use call_agent_core::{RoutingRule, TenantId};

use crate::StorageError;

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn create(&self, rule: RoutingRule) -> Result<RoutingRule, StorageError>;
    async fn update(&self, rule: RoutingRule) -> Result<(), StorageError>;
    async fn get(&self, tenant: TenantId, id: Uuid) -> Result<Option<RoutingRule>, StorageError>;
    /// Active rules of a tenant, ordered by ascending priority
    async fn active_rules(&self, tenant: TenantId) -> Result<Vec<RoutingRule>, StorageError>;
}

/// In-memory rule store
pub struct MemoryRuleStore {
    rules: RwLock<HashMap<Uuid, RoutingRule>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn create(&self, rule: RoutingRule) -> Result<RoutingRule, StorageError> {
        self.rules.write().insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn update(&self, rule: RoutingRule) -> Result<(), StorageError> {
        let mut rules = self.rules.write();
        match rules.get(&rule.id) {
            Some(existing) if existing.tenant_id == rule.tenant_id => {
                rules.insert(rule.id, rule);
                Ok(())
            }
            _ => Err(StorageError::not_found("routing_rule", rule.id)),
        }
    }

    async fn get(&self, tenant: TenantId, id: Uuid) -> Result<Option<RoutingRule>, StorageError> {
        Ok(self
            .rules
            .read()
            .get(&id)
            .filter(|r| r.tenant_id == tenant)
            .cloned())
    }

    async fn active_rules(&self, tenant: TenantId) -> Result<Vec<RoutingRule>, StorageError> {
        let mut rules: Vec<RoutingRule> = self
            .rules
            .read()
            .values()
            .filter(|r| r.tenant_id == tenant && r.active)
            .cloned()
            .collect();
        // Fallback rules sort after everything of the same priority
        rules.sort_by_key(|r| (r.priority, r.is_fallback, r.name.clone()));
        Ok(rules)
    }
}
