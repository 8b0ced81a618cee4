//! Job service

use chrono::{Datelike, Utc};
use std::sync::Arc;
use uuid::Uuid;

use call_agent_compliance::AuditLedger;
use call_agent_core::{
    Job, JobDraft, JobHistoryEntry, JobNumber, JobStatus, TenantId, Urgency,
};
use call_agent_dispatch::{
    EscalationDue, EscalationTimers, MatchOutcome, MatchRequest, RoutingDecision, RoutingEngine,
    TechnicianMatcher,
};
use call_agent_scheduling::{SchedulingEngine, SlotCriteria};
use call_agent_storage::Storage;

use crate::notify::NotificationChannel;
use crate::JobError;

/// Validated status update request
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub job_id: Uuid,
    pub new_status: JobStatus,
    pub actor: String,
    pub reason: Option<String>,
}

/// Creates jobs from drafts and drives routing, scheduling and notifications
pub struct JobService {
    storage: Storage,
    routing: Arc<RoutingEngine>,
    scheduling: Arc<SchedulingEngine>,
    ledger: Arc<AuditLedger>,
    notifications: Vec<Arc<dyn NotificationChannel>>,
    escalations: EscalationTimers,
}

impl JobService {
    pub fn new(
        storage: Storage,
        routing: Arc<RoutingEngine>,
        scheduling: Arc<SchedulingEngine>,
        ledger: Arc<AuditLedger>,
        notifications: Vec<Arc<dyn NotificationChannel>>,
        escalations: EscalationTimers,
    ) -> Self {
        Self {
            storage,
            routing,
            scheduling,
            ledger,
            notifications,
            escalations,
        }
    }

    /// Create a job from a draft: assign a number, persist, route, assign a
    /// worker, optionally auto-book a slot, notify, and audit.
    pub async fn create(&self, draft: JobDraft, actor: &str) -> Result<Job, JobError> {
        let tenant = draft.tenant_id;
        let year = Utc::now().year();
        let seq = self.storage.jobs.next_job_seq(tenant, year).await?;
        let number = JobNumber::format(year, seq);

        let mut job = Job::from_draft(draft, number);

        let history = JobHistoryEntry::new(job.id, actor, "created").with_detail(
            serde_json::json!({
                "source": job.source,
                "urgency": job.urgency.as_str(),
                "trade": job.trade.as_str(),
            }),
        );
        job = self.storage.jobs.create(job, history).await?;

        self.ledger
            .append(
                tenant,
                actor,
                "job_created",
                "job",
                Some(job.job_number.to_string()),
                serde_json::json!({
                    "urgency": job.urgency.as_str(),
                    "trade": job.trade.as_str(),
                }),
            )
            .await?;

        // Routing
        let decision = self.routing.route(&job).await?;
        self.apply_routing(&mut job, &decision, actor).await?;

        // Auto-book for emergency and urgent jobs with a known worker
        if job.urgency <= Urgency::Urgent && job.assigned_worker.is_some() {
            if let Err(error) = self.auto_book(&mut job, actor).await {
                // Booking failure never blocks job creation
                tracing::warn!(job = %job.job_number, %error, "Auto-booking failed");
            }
        }

        if decision.send_notification {
            self.notify_assignment(&job).await;
        }

        if let Some(minutes) = decision.escalate_after_minutes {
            self.escalations.schedule(tenant, job.id, minutes);
        }

        tracing::info!(
            tenant = %tenant,
            job = %job.job_number,
            status = job.status.as_str(),
            "Job created"
        );
        Ok(job)
    }

    /// Apply a routing decision: department, worker, priority, history
    async fn apply_routing(
        &self,
        job: &mut Job,
        decision: &RoutingDecision,
        actor: &str,
    ) -> Result<(), JobError> {
        job.assigned_department = decision.department_id;
        job.routing_priority = decision.priority;
        job.routing_reason = Some(decision.reason.clone());

        let mut worker_id = decision.worker_id;

        // Rule named only a department: rank its technicians
        if worker_id.is_none() {
            if let Some(department) = decision.department_id {
                let tenant_info = self
                    .storage
                    .tenants
                    .get(job.tenant_id)
                    .await?
                    .ok_or(JobError::TenantNotFound)?;
                let workers = self
                    .storage
                    .workforce
                    .list_workers(job.tenant_id, Some(department))
                    .await?;

                let mut request = MatchRequest::new(job.trade, job.urgency);
                request.service_radius_km = tenant_info.service_radius_km;

                match TechnicianMatcher::rank(&request, &workers) {
                    MatchOutcome::Ranked(matches) => {
                        worker_id = matches.first().map(|m| m.worker_id);
                    }
                    MatchOutcome::NoneAvailable if job.urgency == Urgency::Emergency => {
                        // Definite signal: escalate to the department fallback
                        let dept = self
                            .storage
                            .workforce
                            .get_department(job.tenant_id, department)
                            .await?;
                        let fallback = dept.and_then(|d| d.fallback_contact);
                        if let Some(contact) = fallback {
                            self.send_all(
                                &contact,
                                "NOTFALL ohne verfügbaren Techniker",
                                &format!(
                                    "Auftrag {} benötigt sofortige Zuweisung.",
                                    job.job_number
                                ),
                            )
                            .await;
                        }
                        tracing::warn!(
                            job = %job.job_number,
                            "No technician available for emergency, fallback contacted"
                        );
                    }
                    MatchOutcome::NoneAvailable => {}
                }
            }
        }

        if let Some(worker_id) = worker_id {
            job.assigned_worker = Some(worker_id);
            job.transition(JobStatus::Assigned)?;

            // Keep the worker's load counter in step with assignments
            if let Some(mut worker) = self
                .storage
                .workforce
                .get_worker(job.tenant_id, worker_id)
                .await?
            {
                worker.current_jobs += 1;
                self.storage.workforce.update_worker(worker).await?;
            }
        }

        let history = JobHistoryEntry::new(job.id, actor, "routed").with_detail(serde_json::json!({
            "department": job.assigned_department,
            "worker": job.assigned_worker,
            "priority": job.routing_priority,
            "reason": decision.reason,
        }));
        self.storage.jobs.update(job.clone(), history).await?;
        Ok(())
    }

    /// Book the earliest slot for the assigned worker
    async fn auto_book(&self, job: &mut Job, actor: &str) -> Result<(), JobError> {
        let worker_id = job.assigned_worker.ok_or(JobError::NotFound(job.id))?;
        let tenant_info = self
            .storage
            .tenants
            .get(job.tenant_id)
            .await?
            .ok_or(JobError::TenantNotFound)?;
        let worker = self
            .storage
            .workforce
            .get_worker(job.tenant_id, worker_id)
            .await?
            .ok_or(JobError::NotFound(worker_id))?;

        let criteria = SlotCriteria::new(job.tenant_id, job.urgency, job.job_type);

        // A slot can be taken between search and book; losing the race means
        // re-running the search and offering the next slot.
        for attempt in 0..3 {
            let slots = self
                .scheduling
                .find_slots(
                    &criteria,
                    &tenant_info.business_hours,
                    std::slice::from_ref(&worker),
                    Utc::now(),
                )
                .await?;

            let Some(slot) = slots.first() else {
                return Ok(());
            };

            match self.scheduling.book(slot, job.tenant_id, job.id).await {
                Ok(_) => {
                    let scheduled = slot.date.and_time(slot.start).and_utc();
                    job.scheduled_at = Some(scheduled);
                    job.updated_at = Utc::now();

                    let history = JobHistoryEntry::new(job.id, actor, "scheduled").with_detail(
                        serde_json::json!({
                            "date": slot.date,
                            "start": slot.start,
                            "technician": slot.technician_id,
                        }),
                    );
                    self.storage.jobs.update(job.clone(), history).await?;
                    return Ok(());
                }
                Err(call_agent_scheduling::SchedulingError::SlotUnavailable) => {
                    tracing::debug!(
                        job = %job.job_number,
                        attempt,
                        "Slot race lost, searching again"
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Validated status transition with timestamp cascade and audit row
    pub async fn update_status(
        &self,
        tenant: TenantId,
        update: StatusUpdate,
    ) -> Result<Job, JobError> {
        let mut job = self
            .storage
            .jobs
            .get(tenant, update.job_id)
            .await?
            .ok_or(JobError::NotFound(update.job_id))?;

        if job.status == update.new_status {
            // No-op by contract
            return Ok(job);
        }

        job.transition(update.new_status)?;

        let history = JobHistoryEntry::new(job.id, &update.actor, "status_changed").with_detail(
            serde_json::json!({
                "status": update.new_status.as_str(),
                "reason": update.reason,
            }),
        );
        self.storage.jobs.update(job.clone(), history).await?;

        self.ledger
            .append(
                tenant,
                &update.actor,
                "job_status_changed",
                "job",
                Some(job.job_number.to_string()),
                serde_json::json!({ "status": update.new_status.as_str() }),
            )
            .await?;

        Ok(job)
    }

    /// Manually assign a worker, re-checking routing constraints
    pub async fn assign_worker(
        &self,
        tenant: TenantId,
        job_id: Uuid,
        worker_id: Uuid,
        actor: &str,
    ) -> Result<Job, JobError> {
        let mut job = self
            .storage
            .jobs
            .get(tenant, job_id)
            .await?
            .ok_or(JobError::NotFound(job_id))?;
        let worker = self
            .storage
            .workforce
            .get_worker(tenant, worker_id)
            .await?
            .ok_or(JobError::NotFound(worker_id))?;

        job.assigned_worker = Some(worker.id);
        job.assigned_department = Some(worker.department_id);
        if job.status == JobStatus::New {
            job.transition(JobStatus::Assigned)?;
        }
        job.updated_at = Utc::now();

        let history = JobHistoryEntry::new(job.id, actor, "assigned").with_detail(
            serde_json::json!({ "worker": worker.id, "worker_name": worker.name }),
        );
        self.storage.jobs.update(job.clone(), history).await?;

        self.ledger
            .append(
                tenant,
                actor,
                "job_assigned",
                "job",
                Some(job.job_number.to_string()),
                serde_json::json!({ "worker": worker.id }),
            )
            .await?;

        Ok(job)
    }

    /// Process one escalation deadline: if the job is still waiting, raise
    /// its priority by a tier and audit the escalation.
    pub async fn handle_escalation(&self, due: EscalationDue) -> Result<(), JobError> {
        let Some(mut job) = self.storage.jobs.get(due.tenant_id, due.job_id).await? else {
            return Ok(());
        };

        if !matches!(job.status, JobStatus::New | JobStatus::Assigned) {
            return Ok(());
        }

        let old_priority = job.routing_priority;
        job.routing_priority = RoutingEngine::escalated_priority(old_priority);
        job.routing_reason = Some(format!(
            "ESCALATED (deadline {} min): {}",
            due.deadline_minutes,
            job.routing_reason.as_deref().unwrap_or("-")
        ));
        job.updated_at = Utc::now();

        let history = JobHistoryEntry::new(job.id, "system", "escalated").with_detail(
            serde_json::json!({
                "old_priority": old_priority,
                "new_priority": job.routing_priority,
            }),
        );
        self.storage.jobs.update(job.clone(), history).await?;

        self.ledger
            .append(
                due.tenant_id,
                "system",
                "escalated",
                "job",
                Some(job.job_number.to_string()),
                serde_json::json!({
                    "old_priority": old_priority,
                    "new_priority": job.routing_priority,
                }),
            )
            .await?;

        tracing::warn!(
            job = %job.job_number,
            old_priority,
            new_priority = job.routing_priority,
            "Job escalated after deadline"
        );
        Ok(())
    }

    /// Drain escalation timers; runs until the timer source is dropped
    pub async fn run_escalations(
        self: Arc<Self>,
        mut rx: tokio::sync::mpsc::Receiver<EscalationDue>,
    ) {
        while let Some(due) = rx.recv().await {
            if let Err(error) = self.handle_escalation(due).await {
                tracing::error!(%error, "Escalation handling failed");
            }
        }
    }

    async fn notify_assignment(&self, job: &Job) {
        let Some(worker_id) = job.assigned_worker else {
            return;
        };
        let Ok(Some(worker)) = self
            .storage
            .workforce
            .get_worker(job.tenant_id, worker_id)
            .await
        else {
            return;
        };

        let subject = format!("Neuer Auftrag {}", job.job_number);
        let body = format!(
            "{} ({}), Priorität {}. {}",
            job.title,
            job.urgency.as_str(),
            job.routing_priority,
            job.address
                .as_ref()
                .map(|a| a.display_line())
                .unwrap_or_default()
        );
        self.send_all(&worker.phone, &subject, &body).await;
    }

    async fn send_all(&self, recipient: &str, subject: &str, body: &str) {
        for channel in &self.notifications {
            if let Err(error) = channel.send(recipient, subject, body).await {
                tracing::warn!(channel = channel.name(), %error, "Notification failed");
            }
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_agent_core::{
        Department, JobSource, JobType, RoutingRule, Tenant, TradeCategory, Worker,
    };
    use call_agent_storage::MemoryAuditStore;
    use crate::notify::SimulatedSmsChannel;

    struct Fixture {
        service: Arc<JobService>,
        sms: Arc<SimulatedSmsChannel>,
        ledger: Arc<AuditLedger>,
        tenant: TenantId,
        department: Uuid,
        worker: Uuid,
    }

    async fn fixture() -> Fixture {
        let storage = Storage::in_memory();
        let ledger = Arc::new(AuditLedger::new(Arc::new(MemoryAuditStore::new())));

        let tenant = Tenant::new("Mustermann Haustechnik");
        let tenant_id = tenant.id;
        storage.tenants.create(tenant).await.unwrap();

        let department = Department::new(
            tenant_id,
            "SHK",
            vec![TradeCategory::PlumbingHeating, TradeCategory::Sanitary],
        );
        let department_id = department.id;
        storage.workforce.create_department(department).await.unwrap();

        let mut worker = Worker::new(
            tenant_id,
            department_id,
            "Hans Müller",
            vec![TradeCategory::PlumbingHeating],
        );
        worker.phone = "+49170111".to_string();
        worker.on_emergency_duty = true;
        let worker_id = worker.id;
        storage.workforce.create_worker(worker).await.unwrap();

        storage
            .rules
            .create(RoutingRule::fallback(tenant_id, department_id))
            .await
            .unwrap();

        let routing = Arc::new(RoutingEngine::new(
            storage.rules.clone(),
            storage.workforce.clone(),
        ));
        let scheduling = Arc::new(SchedulingEngine::new(storage.calendar.clone()));
        let sms = Arc::new(SimulatedSmsChannel::new());
        let (escalations, _rx) = EscalationTimers::new(16);

        let service = Arc::new(JobService::new(
            storage,
            routing,
            scheduling,
            ledger.clone(),
            vec![sms.clone()],
            escalations,
        ));

        Fixture {
            service,
            sms,
            ledger,
            tenant: tenant_id,
            department: department_id,
            worker: worker_id,
        }
    }

    fn draft(tenant: TenantId, urgency: Urgency) -> JobDraft {
        JobDraft {
            tenant_id: tenant,
            contact_id: None,
            title: "Heizung kalt".to_string(),
            description: "Heizkörper wird nicht warm".to_string(),
            trade: TradeCategory::PlumbingHeating,
            job_type: JobType::Repair,
            urgency,
            source: JobSource::Phone,
            address: None,
            distance_from_hq_km: None,
            preferred_window: None,
            access_notes: None,
            recording_consented: false,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_number_and_routes() {
        let f = fixture().await;

        let job = f
            .service
            .create(draft(f.tenant, Urgency::Normal), "session-1")
            .await
            .unwrap();

        assert!(job.job_number.0.starts_with("JOB-"));
        assert_eq!(job.assigned_department, Some(f.department));
        assert_eq!(job.assigned_worker, Some(f.worker));
        assert_eq!(job.status, JobStatus::Assigned);

        let history = f
            .service
            .storage()
            .jobs
            .history(f.tenant, job.id)
            .await
            .unwrap();
        let actions: Vec<&str> = history.iter().map(|h| h.action.as_str()).collect();
        assert!(actions.contains(&"created"));
        assert!(actions.contains(&"routed"));
    }

    #[tokio::test]
    async fn test_numbers_are_sequential() {
        let f = fixture().await;

        let a = f
            .service
            .create(draft(f.tenant, Urgency::Normal), "s")
            .await
            .unwrap();
        let b = f
            .service
            .create(draft(f.tenant, Urgency::Normal), "s")
            .await
            .unwrap();

        let (year_a, seq_a) = JobNumber::parse(&a.job_number.0).unwrap();
        let (year_b, seq_b) = JobNumber::parse(&b.job_number.0).unwrap();
        assert_eq!(year_a, year_b);
        assert_eq!(seq_b, seq_a + 1);
    }

    #[tokio::test]
    async fn test_emergency_notifies_worker() {
        let f = fixture().await;

        let job = f
            .service
            .create(draft(f.tenant, Urgency::Emergency), "session-1")
            .await
            .unwrap();

        assert_eq!(job.routing_priority, Urgency::Emergency.default_priority());
        let sent = f.sms.sent_messages();
        assert!(!sent.is_empty());
        assert!(sent[0].subject.contains(&job.job_number.0));
    }

    #[tokio::test]
    async fn test_status_transitions_guarded() {
        let f = fixture().await;
        let job = f
            .service
            .create(draft(f.tenant, Urgency::Normal), "s")
            .await
            .unwrap();

        // Assigned -> InProgress -> Completed
        let job = f
            .service
            .update_status(
                f.tenant,
                StatusUpdate {
                    job_id: job.id,
                    new_status: JobStatus::InProgress,
                    actor: "worker".to_string(),
                    reason: None,
                },
            )
            .await
            .unwrap();
        assert!(job.started_at.is_some());

        let job = f
            .service
            .update_status(
                f.tenant,
                StatusUpdate {
                    job_id: job.id,
                    new_status: JobStatus::Completed,
                    actor: "worker".to_string(),
                    reason: None,
                },
            )
            .await
            .unwrap();
        assert!(job.completed_at.is_some());

        // Terminal status is a sink
        let result = f
            .service
            .update_status(
                f.tenant,
                StatusUpdate {
                    job_id: job.id,
                    new_status: JobStatus::InProgress,
                    actor: "worker".to_string(),
                    reason: None,
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_same_status_is_noop() {
        let f = fixture().await;
        let job = f
            .service
            .create(draft(f.tenant, Urgency::Normal), "s")
            .await
            .unwrap();
        let before = f
            .service
            .storage()
            .jobs
            .history(f.tenant, job.id)
            .await
            .unwrap()
            .len();

        f.service
            .update_status(
                f.tenant,
                StatusUpdate {
                    job_id: job.id,
                    new_status: job.status,
                    actor: "s".to_string(),
                    reason: None,
                },
            )
            .await
            .unwrap();

        let after = f
            .service
            .storage()
            .jobs
            .history(f.tenant, job.id)
            .await
            .unwrap()
            .len();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_escalation_raises_priority() {
        let f = fixture().await;
        let job = f
            .service
            .create(draft(f.tenant, Urgency::Normal), "s")
            .await
            .unwrap();

        f.service
            .handle_escalation(EscalationDue {
                tenant_id: f.tenant,
                job_id: job.id,
                deadline_minutes: 60,
            })
            .await
            .unwrap();

        let escalated = f
            .service
            .storage()
            .jobs
            .get(f.tenant, job.id)
            .await
            .unwrap()
            .unwrap();
        assert!(escalated.routing_priority < job.routing_priority);
        assert!(escalated
            .routing_reason
            .as_deref()
            .unwrap()
            .starts_with("ESCALATED"));

        let rows = f.ledger.for_entity(f.tenant, "job", None).await.unwrap();
        assert!(rows.iter().any(|r| r.action == "escalated"));
    }

    #[tokio::test]
    async fn test_escalation_skips_completed_jobs() {
        let f = fixture().await;
        let job = f
            .service
            .create(draft(f.tenant, Urgency::Normal), "s")
            .await
            .unwrap();
        f.service
            .update_status(
                f.tenant,
                StatusUpdate {
                    job_id: job.id,
                    new_status: JobStatus::Cancelled,
                    actor: "admin".to_string(),
                    reason: Some("Kunde storniert".to_string()),
                },
            )
            .await
            .unwrap();

        f.service
            .handle_escalation(EscalationDue {
                tenant_id: f.tenant,
                job_id: job.id,
                deadline_minutes: 60,
            })
            .await
            .unwrap();

        let unchanged = f
            .service
            .storage()
            .jobs
            .get(f.tenant, job.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.routing_priority, job.routing_priority);
    }

    #[tokio::test]
    async fn test_worker_load_incremented() {
        let f = fixture().await;
        f.service
            .create(draft(f.tenant, Urgency::Normal), "s")
            .await
            .unwrap();

        let worker = f
            .service
            .storage()
            .workforce
            .get_worker(f.tenant, f.worker)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(worker.current_jobs, 1);
    }
}
