//! Routing rule entity
//!
//! Rules are evaluated in ascending priority order; the first rule whose
//! conditions all match wins. A missing condition matches everything.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::{Job, JobType, TradeCategory, Urgency};
use crate::tenant::TenantId;

/// Conditions evaluated against a job; all present conditions must match
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConditions {
    pub job_types: Option<Vec<JobType>>,
    pub urgencies: Option<Vec<Urgency>>,
    pub trades: Option<Vec<TradeCategory>>,
    /// Postal code prefix, e.g. "72" matches "72070"
    pub postal_prefix: Option<String>,
    /// Match only when the job was created within this local time-of-day range
    pub time_of_day: Option<(NaiveTime, NaiveTime)>,
    /// Maximum distance from HQ in kilometers
    pub max_distance_km: Option<f64>,
}

impl RuleConditions {
    /// True if the job satisfies every present condition
    pub fn matches(&self, job: &Job, created_time: NaiveTime) -> bool {
        if let Some(ref types) = self.job_types {
            if !types.contains(&job.job_type) {
                return false;
            }
        }
        if let Some(ref urgencies) = self.urgencies {
            if !urgencies.contains(&job.urgency) {
                return false;
            }
        }
        if let Some(ref trades) = self.trades {
            if !trades.contains(&job.trade) {
                return false;
            }
        }
        if let Some(ref prefix) = self.postal_prefix {
            match job.address.as_ref() {
                Some(addr) if addr.postal_code.starts_with(prefix.as_str()) => {}
                _ => return false,
            }
        }
        if let Some((start, end)) = self.time_of_day {
            if created_time < start || created_time >= end {
                return false;
            }
        }
        if let Some(max_km) = self.max_distance_km {
            match job.distance_from_hq_km {
                Some(d) if d <= max_km => {}
                _ => return false,
            }
        }
        true
    }
}

/// Rule action: route to a department, optionally directly to a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingAction {
    pub department_id: Option<Uuid>,
    pub worker_id: Option<Uuid>,
}

/// Declarative routing rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub name: String,
    /// Evaluation order, ascending; also used as the job's routing priority
    pub priority: u8,
    pub conditions: RuleConditions,
    pub action: RoutingAction,
    /// Escalate the job if still unhandled after this many minutes
    pub escalate_after_minutes: Option<u32>,
    pub send_notification: bool,
    pub active: bool,
    /// Catch-all fallback rule; every tenant must keep exactly one
    pub is_fallback: bool,
}

impl RoutingRule {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, priority: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            priority,
            conditions: RuleConditions::default(),
            action: RoutingAction {
                department_id: None,
                worker_id: None,
            },
            escalate_after_minutes: None,
            send_notification: false,
            active: true,
            is_fallback: false,
        }
    }

    /// Catch-all rule routing everything to the given department
    pub fn fallback(tenant_id: TenantId, department_id: Uuid) -> Self {
        let mut rule = Self::new(tenant_id, "Fallback", 99);
        rule.action.department_id = Some(department_id);
        rule.is_fallback = true;
        rule
    }
}
