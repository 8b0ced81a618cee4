//! Escalation deadline timers
//!
//! A routing rule may declare an escalation deadline. A timer fires after
//! the deadline; the job service decides whether the job still needs the
//! priority bump (it may have completed meanwhile).

use chrono::Duration as ChronoDuration;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use call_agent_core::TenantId;

/// Emitted when an escalation deadline expires
#[derive(Debug, Clone)]
pub struct EscalationDue {
    pub tenant_id: TenantId,
    pub job_id: Uuid,
    pub deadline_minutes: u32,
}

/// Spawns one tokio timer per scheduled escalation
pub struct EscalationTimers {
    tx: mpsc::Sender<EscalationDue>,
}

impl EscalationTimers {
    /// Create the timer source and the receiving end for the job service
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<EscalationDue>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    /// Schedule an escalation check after `minutes`
    pub fn schedule(&self, tenant_id: TenantId, job_id: Uuid, minutes: u32) {
        let tx = self.tx.clone();
        let delay = Duration::from_secs(minutes as u64 * 60);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let due = EscalationDue {
                tenant_id,
                job_id,
                deadline_minutes: minutes,
            };
            if tx.send(due).await.is_err() {
                tracing::debug!(job = %job_id, "Escalation receiver gone, timer dropped");
            }
        });

        tracing::debug!(
            tenant = %tenant_id,
            job = %job_id,
            minutes,
            "Escalation timer scheduled"
        );
    }

    /// Deadline as a chrono duration, for persistence-facing callers
    pub fn deadline_duration(minutes: u32) -> ChronoDuration {
        ChronoDuration::minutes(minutes as i64)
    }
}
