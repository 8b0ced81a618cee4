//! Job entity and status machine
//!
//! A Job is the central persisted entity: a service request created from a
//! conversation or directly through the API.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::contact::Address;
use crate::error::CoreError;
use crate::tenant::TenantId;

/// Urgency buckets produced by triage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Emergency,
    Urgent,
    Normal,
    Routine,
}

impl Urgency {
    /// Maximum wait before the appointment window closes
    pub fn max_wait_hours(&self) -> i64 {
        match self {
            Urgency::Emergency => 2,
            Urgency::Urgent => 8,
            Urgency::Normal => 48,
            Urgency::Routine => 24 * 14,
        }
    }

    /// Default routing priority (1-99, lower is higher priority)
    pub fn default_priority(&self) -> u8 {
        match self {
            Urgency::Emergency => 1,
            Urgency::Urgent => 25,
            Urgency::Normal => 50,
            Urgency::Routine => 75,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Emergency => "emergency",
            Urgency::Urgent => "urgent",
            Urgency::Normal => "normal",
            Urgency::Routine => "routine",
        }
    }
}

/// Trade categories (Gewerke)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TradeCategory {
    PlumbingHeating,
    Electrical,
    Sanitary,
    Locksmith,
    Roofing,
    Painting,
    Carpentry,
    General,
}

impl TradeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeCategory::PlumbingHeating => "plumbing-heating",
            TradeCategory::Electrical => "electrical",
            TradeCategory::Sanitary => "sanitary",
            TradeCategory::Locksmith => "locksmith",
            TradeCategory::Roofing => "roofing",
            TradeCategory::Painting => "painting",
            TradeCategory::Carpentry => "carpentry",
            TradeCategory::General => "general",
        }
    }
}

/// Where the request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    Phone,
    Email,
    Chat,
    Form,
    Messenger,
}

/// Kind of work requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Emergency,
    Repair,
    Installation,
    Maintenance,
    Inspection,
    Quote,
}

impl JobType {
    /// Standard appointment slot duration in minutes
    pub fn slot_minutes(&self) -> u32 {
        match self {
            JobType::Emergency => 120,
            JobType::Repair => 60,
            JobType::Installation => 180,
            JobType::Maintenance => 90,
            JobType::Inspection => 45,
            JobType::Quote => 30,
        }
    }
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    New,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    /// Check whether a transition to `next` is allowed.
    ///
    /// Terminal statuses (completed, cancelled) are sinks.
    pub fn can_transition(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (New, Assigned) | (Assigned, InProgress) | (InProgress, Completed)
                | (New, Cancelled) | (Assigned, Cancelled) | (InProgress, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::New => "new",
            JobStatus::Assigned => "assigned",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

/// Human-readable job number, `JOB-YYYY-NNNN`, monotonic within tenant-year
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobNumber(pub String);

impl JobNumber {
    pub fn format(year: i32, seq: u32) -> Self {
        Self(format!("JOB-{}-{:04}", year, seq))
    }

    pub fn parse(s: &str) -> Result<(i32, u32), CoreError> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 3 || parts[0] != "JOB" {
            return Err(CoreError::InvalidJobNumber(s.to_string()));
        }
        let year = parts[1]
            .parse::<i32>()
            .map_err(|_| CoreError::InvalidJobNumber(s.to_string()))?;
        let seq = parts[2]
            .parse::<u32>()
            .map_err(|_| CoreError::InvalidJobNumber(s.to_string()))?;
        Ok((year, seq))
    }
}

impl fmt::Display for JobNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Preferred appointment window stated by the customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferredWindow {
    pub date: Option<NaiveDate>,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
}

/// A service request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub job_number: JobNumber,
    pub contact_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub trade: TradeCategory,
    pub job_type: JobType,
    pub urgency: Urgency,
    pub status: JobStatus,
    pub source: JobSource,
    /// Address snapshot at creation time
    pub address: Option<Address>,
    /// Distance from tenant HQ in kilometers
    pub distance_from_hq_km: Option<f64>,
    /// Routing priority, 1-99, lower is higher priority
    pub routing_priority: u8,
    pub routing_reason: Option<String>,
    pub assigned_department: Option<Uuid>,
    pub assigned_worker: Option<Uuid>,
    pub preferred_window: Option<PreferredWindow>,
    /// "Schlüssel beim Nachbarn", gate codes and similar
    pub access_notes: Option<String>,
    pub recording_consented: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Build a job from a draft with a freshly assigned number
    pub fn from_draft(draft: JobDraft, job_number: JobNumber) -> Self {
        let now = Utc::now();
        let urgency = draft.urgency;
        Self {
            id: Uuid::new_v4(),
            tenant_id: draft.tenant_id,
            job_number,
            contact_id: draft.contact_id,
            title: draft.title,
            description: draft.description,
            trade: draft.trade,
            job_type: draft.job_type,
            urgency,
            status: JobStatus::New,
            source: draft.source,
            address: draft.address,
            distance_from_hq_km: draft.distance_from_hq_km,
            routing_priority: urgency.default_priority(),
            routing_reason: None,
            assigned_department: None,
            assigned_worker: None,
            preferred_window: draft.preferred_window,
            access_notes: draft.access_notes,
            recording_consented: draft.recording_consented,
            created_at: now,
            updated_at: now,
            scheduled_at: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Validate and apply a status transition, cascading timestamps
    pub fn transition(&mut self, next: JobStatus) -> Result<(), CoreError> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition(next) {
            return Err(CoreError::IllegalTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }

        let now = Utc::now();
        match next {
            JobStatus::InProgress => self.started_at = Some(now),
            JobStatus::Completed => self.completed_at = Some(now),
            _ => {}
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Current year used for the job number
    pub fn number_year(&self) -> i32 {
        self.created_at.year()
    }
}

/// Input for job creation, before a number is assigned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDraft {
    pub tenant_id: TenantId,
    pub contact_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub trade: TradeCategory,
    pub job_type: JobType,
    pub urgency: Urgency,
    pub source: JobSource,
    pub address: Option<Address>,
    pub distance_from_hq_km: Option<f64>,
    pub preferred_window: Option<PreferredWindow>,
    pub access_notes: Option<String>,
    pub recording_consented: bool,
}

/// Append-only history row describing one job mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHistoryEntry {
    pub id: Uuid,
    pub job_id: Uuid,
    /// "system", a worker id, or a session id
    pub actor: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub detail: serde_json::Value,
}

impl JobHistoryEntry {
    pub fn new(job_id: Uuid, actor: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            actor: actor.into(),
            action: action.into(),
            timestamp: Utc::now(),
            detail: serde_json::Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> JobDraft {
        JobDraft {
            tenant_id: TenantId::new(),
            contact_id: None,
            title: "Heizung kalt".to_string(),
            description: "Heizung wird nicht warm".to_string(),
            trade: TradeCategory::PlumbingHeating,
            job_type: JobType::Repair,
            urgency: Urgency::Urgent,
            source: JobSource::Phone,
            address: None,
            distance_from_hq_km: None,
            preferred_window: None,
            access_notes: None,
            recording_consented: false,
        }
    }

    #[test]
    fn test_job_number_format() {
        let n = JobNumber::format(2025, 7);
        assert_eq!(n.0, "JOB-2025-0007");
        assert_eq!(JobNumber::parse(&n.0).unwrap(), (2025, 7));
        assert!(JobNumber::parse("TICKET-2025-0007").is_err());
    }

    #[test]
    fn test_valid_transitions() {
        let mut job = Job::from_draft(draft(), JobNumber::format(2025, 1));

        job.transition(JobStatus::Assigned).unwrap();
        job.transition(JobStatus::InProgress).unwrap();
        assert!(job.started_at.is_some());

        job.transition(JobStatus::Completed).unwrap();
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_terminal_is_sink() {
        let mut job = Job::from_draft(draft(), JobNumber::format(2025, 1));
        job.transition(JobStatus::Cancelled).unwrap();

        assert!(job.transition(JobStatus::Assigned).is_err());
        assert!(job.transition(JobStatus::InProgress).is_err());
    }

    #[test]
    fn test_same_status_is_noop() {
        let mut job = Job::from_draft(draft(), JobNumber::format(2025, 1));
        let updated = job.updated_at;
        job.transition(JobStatus::New).unwrap();
        assert_eq!(job.updated_at, updated);
    }

    #[test]
    fn test_skipping_assigned_rejected() {
        let mut job = Job::from_draft(draft(), JobNumber::format(2025, 1));
        assert!(job.transition(JobStatus::Completed).is_err());
    }

    #[test]
    fn test_urgency_priorities() {
        assert!(Urgency::Emergency.default_priority() < Urgency::Urgent.default_priority());
        assert!(Urgency::Urgent.default_priority() < Urgency::Routine.default_priority());
    }

    #[test]
    fn test_job_serialization_roundtrip() {
        let job = Job::from_draft(draft(), JobNumber::format(2025, 42));
        let json = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, job.id);
        assert_eq!(back.job_number, job.job_number);
        assert_eq!(back.status, job.status);
        assert_eq!(back.urgency, job.urgency);
    }
}
