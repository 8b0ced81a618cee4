//! Rule-based job routing

use chrono::Timelike;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use call_agent_core::{Job, Urgency};
use call_agent_storage::{RuleStore, WorkforceStore};

use crate::DispatchError;

/// Result of routing one job
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub department_id: Option<Uuid>,
    pub worker_id: Option<Uuid>,
    /// 1-99, lower is higher priority
    pub priority: u8,
    pub reason: String,
    pub escalate_after_minutes: Option<u32>,
    pub send_notification: bool,
    pub matched_rule: Option<Uuid>,
}

/// Deterministic first-match routing over a tenant's active rules.
///
/// Re-evaluating an unchanged job against an unchanged rule set always
/// produces the same decision.
pub struct RoutingEngine {
    rules: Arc<dyn RuleStore>,
    workforce: Arc<dyn WorkforceStore>,
}

impl RoutingEngine {
    pub fn new(rules: Arc<dyn RuleStore>, workforce: Arc<dyn WorkforceStore>) -> Self {
        Self { rules, workforce }
    }

    /// Route a job to a department and optionally a worker
    pub async fn route(&self, job: &Job) -> Result<RoutingDecision, DispatchError> {
        let tenant = job.tenant_id;
        let rules = self.rules.active_rules(tenant).await?;
        let created_time = job.created_at.time().with_nanosecond(0).unwrap_or(job.created_at.time());

        for rule in &rules {
            if !rule.conditions.matches(job, created_time) && !rule.is_fallback {
                continue;
            }

            let mut decision = RoutingDecision {
                department_id: rule.action.department_id,
                worker_id: rule.action.worker_id,
                priority: if rule.is_fallback {
                    job.urgency.default_priority()
                } else {
                    rule.priority
                },
                reason: format!("Matched rule: {}", rule.name),
                escalate_after_minutes: rule.escalate_after_minutes,
                send_notification: rule.send_notification,
                matched_rule: Some(rule.id),
            };

            // Emergencies always notify, whatever the rule says
            if job.urgency == Urgency::Emergency {
                decision.send_notification = true;
                decision.escalate_after_minutes =
                    Some(decision.escalate_after_minutes.unwrap_or(15));
            }

            tracing::info!(
                tenant = %tenant,
                job = %job.job_number,
                rule = %rule.name,
                priority = decision.priority,
                "Job routed"
            );
            return Ok(decision);
        }

        // No rule and no fallback rule: route to a department handling the trade
        self.default_route(job).await
    }

    async fn default_route(&self, job: &Job) -> Result<RoutingDecision, DispatchError> {
        let departments = self
            .workforce
            .departments_for_trade(job.tenant_id, job.trade)
            .await?;

        let department = departments
            .into_iter()
            .min_by_key(|d| d.name.clone())
            .ok_or(DispatchError::NoRouteFound)?;

        tracing::info!(
            tenant = %job.tenant_id,
            job = %job.job_number,
            department = %department.name,
            "Job routed by trade default"
        );

        Ok(RoutingDecision {
            department_id: Some(department.id),
            worker_id: None,
            priority: job.urgency.default_priority(),
            reason: format!(
                "Default routing: {} handles {}",
                department.name,
                job.trade.as_str()
            ),
            escalate_after_minutes: match job.urgency {
                Urgency::Emergency => Some(15),
                Urgency::Urgent => Some(60),
                _ => None,
            },
            send_notification: matches!(job.urgency, Urgency::Emergency | Urgency::Urgent),
            matched_rule: None,
        })
    }

    /// Raise a job's priority by one tier bucket, clamped at 1
    pub fn escalated_priority(current: u8) -> u8 {
        current.saturating_sub(25).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_agent_core::{
        Department, JobDraft, JobNumber, JobSource, JobType, RoutingRule, TenantId, TradeCategory,
    };
    use call_agent_storage::{MemoryRuleStore, MemoryWorkforceStore};

    fn job(tenant: TenantId, trade: TradeCategory, urgency: Urgency) -> Job {
        let draft = JobDraft {
            tenant_id: tenant,
            contact_id: None,
            title: "t".to_string(),
            description: "d".to_string(),
            trade,
            job_type: JobType::Repair,
            urgency,
            source: JobSource::Phone,
            address: None,
            distance_from_hq_km: None,
            preferred_window: None,
            access_notes: None,
            recording_consented: false,
        };
        Job::from_draft(draft, JobNumber::format(2025, 1))
    }

    async fn engine_with(
        rules: Vec<RoutingRule>,
        departments: Vec<Department>,
    ) -> RoutingEngine {
        let rule_store = Arc::new(MemoryRuleStore::new());
        for rule in rules {
            rule_store.create(rule).await.unwrap();
        }
        let workforce = Arc::new(MemoryWorkforceStore::new());
        for dept in departments {
            workforce.create_department(dept).await.unwrap();
        }
        RoutingEngine::new(rule_store, workforce)
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let tenant = TenantId::new();
        let dept_a = Uuid::new_v4();
        let dept_b = Uuid::new_v4();

        let mut emergency_rule = RoutingRule::new(tenant, "Notdienst", 1);
        emergency_rule.conditions.urgencies = Some(vec![Urgency::Emergency]);
        emergency_rule.action.department_id = Some(dept_a);

        let mut broad_rule = RoutingRule::new(tenant, "Alles", 50);
        broad_rule.action.department_id = Some(dept_b);

        let engine = engine_with(vec![broad_rule, emergency_rule], vec![]).await;

        let decision = engine
            .route(&job(tenant, TradeCategory::PlumbingHeating, Urgency::Emergency))
            .await
            .unwrap();
        assert_eq!(decision.department_id, Some(dept_a));
        assert_eq!(decision.priority, 1);

        let decision = engine
            .route(&job(tenant, TradeCategory::PlumbingHeating, Urgency::Normal))
            .await
            .unwrap();
        assert_eq!(decision.department_id, Some(dept_b));
    }

    #[tokio::test]
    async fn test_fallback_rule_catches_everything() {
        let tenant = TenantId::new();
        let fallback_dept = Uuid::new_v4();

        let mut narrow = RoutingRule::new(tenant, "Elektro", 5);
        narrow.conditions.trades = Some(vec![TradeCategory::Electrical]);
        narrow.action.department_id = Some(Uuid::new_v4());

        let engine = engine_with(
            vec![narrow, RoutingRule::fallback(tenant, fallback_dept)],
            vec![],
        )
        .await;

        let decision = engine
            .route(&job(tenant, TradeCategory::Roofing, Urgency::Routine))
            .await
            .unwrap();
        assert_eq!(decision.department_id, Some(fallback_dept));
        assert_eq!(decision.priority, Urgency::Routine.default_priority());
    }

    #[tokio::test]
    async fn test_default_routing_by_trade() {
        let tenant = TenantId::new();
        let dept = Department::new(tenant, "SHK", vec![TradeCategory::PlumbingHeating]);
        let dept_id = dept.id;

        let engine = engine_with(vec![], vec![dept]).await;
        let decision = engine
            .route(&job(tenant, TradeCategory::PlumbingHeating, Urgency::Urgent))
            .await
            .unwrap();

        assert_eq!(decision.department_id, Some(dept_id));
        assert!(decision.send_notification);
        assert_eq!(decision.escalate_after_minutes, Some(60));
    }

    #[tokio::test]
    async fn test_no_route_found() {
        let tenant = TenantId::new();
        let engine = engine_with(vec![], vec![]).await;

        let result = engine
            .route(&job(tenant, TradeCategory::Painting, Urgency::Normal))
            .await;
        assert!(matches!(result, Err(DispatchError::NoRouteFound)));
    }

    #[tokio::test]
    async fn test_routing_is_deterministic() {
        let tenant = TenantId::new();
        let dept = Uuid::new_v4();

        let mut rule = RoutingRule::new(tenant, "SHK Bezirk", 10);
        rule.conditions.trades = Some(vec![TradeCategory::PlumbingHeating]);
        rule.action.department_id = Some(dept);

        let engine = engine_with(vec![rule], vec![]).await;
        let j = job(tenant, TradeCategory::PlumbingHeating, Urgency::Normal);

        let a = engine.route(&j).await.unwrap();
        let b = engine.route(&j).await.unwrap();

        assert_eq!(a.department_id, b.department_id);
        assert_eq!(a.priority, b.priority);
        assert_eq!(a.reason, b.reason);
    }

    #[test]
    fn test_escalated_priority_clamps() {
        assert_eq!(RoutingEngine::escalated_priority(50), 25);
        assert_eq!(RoutingEngine::escalated_priority(25), 1);
        assert_eq!(RoutingEngine::escalated_priority(10), 1);
    }
}
