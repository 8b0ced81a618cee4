//! Job store with history and per-tenant-year numbering

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use call_agent_core::{Job, JobHistoryEntry, JobSource, JobStatus, TenantId, TradeCategory, Urgency};

use crate::StorageError;

/// Listing filter; all present fields must match
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub urgency: Option<Urgency>,
    pub trade: Option<TradeCategory>,
    pub source: Option<JobSource>,
    pub contact_id: Option<Uuid>,
    pub assigned_worker: Option<Uuid>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring over title and description
    pub text: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl JobFilter {
    fn matches(&self, job: &Job) -> bool {
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        if let Some(urgency) = self.urgency {
            if job.urgency != urgency {
                return false;
            }
        }
        if let Some(trade) = self.trade {
            if job.trade != trade {
                return false;
            }
        }
        if let Some(source) = self.source {
            if job.source != source {
                return false;
            }
        }
        if let Some(contact) = self.contact_id {
            if job.contact_id != Some(contact) {
                return false;
            }
        }
        if let Some(worker) = self.assigned_worker {
            if job.assigned_worker != Some(worker) {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if job.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if job.created_at > before {
                return false;
            }
        }
        if let Some(ref text) = self.text {
            let needle = text.to_lowercase();
            if !job.title.to_lowercase().contains(&needle)
                && !job.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Reserve the next job sequence number for a tenant-year. Atomic:
    /// concurrent callers receive distinct, contiguous values.
    async fn next_job_seq(&self, tenant: TenantId, year: i32) -> Result<u32, StorageError>;

    /// Persist a new job together with its first history row (atomic)
    async fn create(&self, job: Job, history: JobHistoryEntry) -> Result<Job, StorageError>;

    async fn get(&self, tenant: TenantId, id: Uuid) -> Result<Option<Job>, StorageError>;

    /// Update a job and append a history row (atomic)
    async fn update(&self, job: Job, history: JobHistoryEntry) -> Result<(), StorageError>;

    async fn list(&self, tenant: TenantId, filter: &JobFilter) -> Result<Vec<Job>, StorageError>;

    async fn history(&self, tenant: TenantId, job_id: Uuid)
        -> Result<Vec<JobHistoryEntry>, StorageError>;

    /// Counts per status for the stats endpoint
    async fn counts_by_status(
        &self,
        tenant: TenantId,
    ) -> Result<HashMap<String, usize>, StorageError>;
}

/// In-memory job store
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
    history: RwLock<HashMap<Uuid, Vec<JobHistoryEntry>>>,
    counters: RwLock<HashMap<(TenantId, i32), u32>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            history: RwLock::new(HashMap::new()),
            counters: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn next_job_seq(&self, tenant: TenantId, year: i32) -> Result<u32, StorageError> {
        let mut counters = self.counters.write();
        let counter = counters.entry((tenant, year)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn create(&self, job: Job, history: JobHistoryEntry) -> Result<Job, StorageError> {
        let mut jobs = self.jobs.write();

        let duplicate = jobs
            .values()
            .any(|j| j.tenant_id == job.tenant_id && j.job_number == job.job_number);
        if duplicate {
            return Err(StorageError::Conflict(format!(
                "job number {}",
                job.job_number
            )));
        }

        self.history.write().entry(job.id).or_default().push(history);
        jobs.insert(job.id, job.clone());

        tracing::debug!(job = %job.job_number, tenant = %job.tenant_id, "Job persisted");
        Ok(job)
    }

    async fn get(&self, tenant: TenantId, id: Uuid) -> Result<Option<Job>, StorageError> {
        Ok(self
            .jobs
            .read()
            .get(&id)
            .filter(|j| j.tenant_id == tenant)
            .cloned())
    }

    async fn update(&self, job: Job, history: JobHistoryEntry) -> Result<(), StorageError> {
        let mut jobs = self.jobs.write();
        match jobs.get(&job.id) {
            Some(existing) if existing.tenant_id == job.tenant_id => {
                self.history.write().entry(job.id).or_default().push(history);
                jobs.insert(job.id, job);
                Ok(())
            }
            _ => Err(StorageError::not_found("job", job.id)),
        }
    }

    async fn list(&self, tenant: TenantId, filter: &JobFilter) -> Result<Vec<Job>, StorageError> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .values()
            .filter(|j| j.tenant_id == tenant && filter.matches(j))
            .cloned()
            .collect();

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let jobs = jobs
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(jobs)
    }

    async fn history(
        &self,
        tenant: TenantId,
        job_id: Uuid,
    ) -> Result<Vec<JobHistoryEntry>, StorageError> {
        let owned = self
            .jobs
            .read()
            .get(&job_id)
            .map(|j| j.tenant_id == tenant)
            .unwrap_or(false);
        if !owned {
            return Ok(Vec::new());
        }
        Ok(self.history.read().get(&job_id).cloned().unwrap_or_default())
    }

    async fn counts_by_status(
        &self,
        tenant: TenantId,
    ) -> Result<HashMap<String, usize>, StorageError> {
        let mut counts = HashMap::new();
        for job in self.jobs.read().values().filter(|j| j.tenant_id == tenant) {
            *counts.entry(job.status.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
