//! Calendar store for technician bookings and blocked intervals

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use call_agent_core::TenantId;

use crate::StorageError;

/// Kind of calendar entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarEntryKind {
    /// A booked appointment tied to a job
    Booking,
    /// Provider-sourced blocked interval (vacation, external appointment)
    Blocked,
}

/// One interval on a technician's calendar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub technician_id: Uuid,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub kind: CalendarEntryKind,
    pub job_id: Option<Uuid>,
    pub created_at: chrono::DateTime<Utc>,
}

impl CalendarEntry {
    pub fn booking(
        tenant_id: TenantId,
        technician_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        job_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            technician_id,
            date,
            start,
            end,
            kind: CalendarEntryKind::Booking,
            job_id: Some(job_id),
            created_at: Utc::now(),
        }
    }

    pub fn blocked(
        tenant_id: TenantId,
        technician_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            technician_id,
            date,
            start,
            end,
            kind: CalendarEntryKind::Blocked,
            job_id: None,
            created_at: Utc::now(),
        }
    }

    /// Overlap test against another interval on the same date
    pub fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start < end && start < self.end
    }
}

#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// Append an entry. Fails with `Conflict` when a booking at the exact
    /// (technician, date, start) already exists.
    async fn append(&self, entry: CalendarEntry) -> Result<CalendarEntry, StorageError>;

    /// Entries for one technician on one date
    async fn entries_for(
        &self,
        tenant: TenantId,
        technician: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<CalendarEntry>, StorageError>;

    async fn remove(&self, tenant: TenantId, id: Uuid) -> Result<(), StorageError>;
}

/// In-memory calendar store
pub struct MemoryCalendarStore {
    entries: RwLock<HashMap<Uuid, CalendarEntry>>,
}

impl MemoryCalendarStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCalendarStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalendarStore for MemoryCalendarStore {
    async fn append(&self, entry: CalendarEntry) -> Result<CalendarEntry, StorageError> {
        let mut entries = self.entries.write();

        if entry.kind == CalendarEntryKind::Booking {
            let taken = entries.values().any(|e| {
                e.tenant_id == entry.tenant_id
                    && e.technician_id == entry.technician_id
                    && e.date == entry.date
                    && e.start == entry.start
                    && e.kind == CalendarEntryKind::Booking
            });
            if taken {
                return Err(StorageError::Conflict(format!(
                    "slot {} {} already booked",
                    entry.date, entry.start
                )));
            }
        }

        entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn entries_for(
        &self,
        tenant: TenantId,
        technician: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<CalendarEntry>, StorageError> {
        let mut found: Vec<CalendarEntry> = self
            .entries
            .read()
            .values()
            .filter(|e| e.tenant_id == tenant && e.technician_id == technician && e.date == date)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.start);
        Ok(found)
    }

    async fn remove(&self, tenant: TenantId, id: Uuid) -> Result<(), StorageError> {
        let mut entries = self.entries.write();
        match entries.get(&id) {
            Some(e) if e.tenant_id == tenant => {
                entries.remove(&id);
                Ok(())
            }
            _ => Err(StorageError::not_found("calendar_entry", id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn test_double_booking_rejected() {
        let store = MemoryCalendarStore::new();
        let tenant = TenantId::new();
        let tech = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();

        let a = CalendarEntry::booking(tenant, tech, date, t(8, 0), t(9, 0), Uuid::new_v4());
        let b = CalendarEntry::booking(tenant, tech, date, t(8, 0), t(9, 0), Uuid::new_v4());

        store.append(a).await.unwrap();
        assert!(store.append(b).await.is_err());
    }

    #[tokio::test]
    async fn test_blocked_intervals_coexist() {
        let store = MemoryCalendarStore::new();
        let tenant = TenantId::new();
        let tech = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();

        store
            .append(CalendarEntry::blocked(tenant, tech, date, t(8, 0), t(12, 0)))
            .await
            .unwrap();
        store
            .append(CalendarEntry::blocked(tenant, tech, date, t(8, 0), t(10, 0)))
            .await
            .unwrap();

        assert_eq!(store.entries_for(tenant, tech, date).await.unwrap().len(), 2);
    }

    #[test]
    fn test_overlap() {
        let tenant = TenantId::new();
        let tech = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        let entry = CalendarEntry::blocked(tenant, tech, date, t(9, 0), t(11, 0));

        assert!(entry.overlaps(t(10, 0), t(12, 0)));
        assert!(entry.overlaps(t(8, 0), t(9, 30)));
        assert!(!entry.overlaps(t(11, 0), t(12, 0)));
    }
}
