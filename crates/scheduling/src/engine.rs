//! Slot search and race-safe booking

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use call_agent_core::{BusinessHours, JobType, TenantId, Urgency, Worker};
use call_agent_storage::{CalendarEntry, CalendarEntryKind, CalendarStore, StorageError};

use crate::windows::TimeWindow;
use crate::SchedulingError;

/// A proposed appointment slot. Ephemeral: bookings materialize as job
/// fields plus a calendar entry, slots themselves are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub technician_id: Uuid,
    pub technician_name: Option<String>,
    /// Matches the customer's stated preference
    pub preferred: bool,
    /// Emergency arrival window
    pub emergency: bool,
}

/// Search parameters
#[derive(Debug, Clone)]
pub struct SlotCriteria {
    pub tenant_id: TenantId,
    pub urgency: Urgency,
    pub job_type: JobType,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub preferred_date: Option<NaiveDate>,
    pub preferred_window: Option<TimeWindow>,
    pub limit: usize,
}

impl SlotCriteria {
    pub fn new(tenant_id: TenantId, urgency: Urgency, job_type: JobType) -> Self {
        Self {
            tenant_id,
            urgency,
            job_type,
            earliest: None,
            latest: None,
            preferred_date: None,
            preferred_window: None,
            limit: 10,
        }
    }
}

type SlotKey = (TenantId, Uuid, NaiveDate, NaiveTime);

/// Slot search and booking over the calendar store
pub struct SchedulingEngine {
    calendar: Arc<dyn CalendarStore>,
    /// Logical per-slot locks; correct for single-process deployments, the
    /// storage unique constraint is the backstop
    booking_locks: Mutex<HashMap<SlotKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl SchedulingEngine {
    pub fn new(calendar: Arc<dyn CalendarStore>) -> Self {
        Self {
            calendar,
            booking_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Find open slots for the given technicians.
    ///
    /// The search window is `max(now, earliest) ..= min(latest, urgency
    /// deadline)`. Returns up to `limit` slots ordered by date, preferred
    /// first within the same day, then start time.
    pub async fn find_slots(
        &self,
        criteria: &SlotCriteria,
        business_hours: &BusinessHours,
        technicians: &[Worker],
        now: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        let window_start = criteria.earliest.map(|e| e.max(now)).unwrap_or(now);
        let deadline = now + Duration::hours(criteria.urgency.max_wait_hours());
        let window_end = criteria.latest.map(|l| l.min(deadline)).unwrap_or(deadline);

        if window_end <= window_start {
            return Ok(Vec::new());
        }

        let slot_minutes = criteria.job_type.slot_minutes() as i64;
        let emergency = criteria.urgency == Urgency::Emergency;

        let mut slots = Vec::new();
        let mut day = window_start.date_naive();
        let last_day = window_end.date_naive();

        while day <= last_day {
            let weekday = day.weekday();
            let Some(open) = business_hours.for_weekday(weekday) else {
                day += Duration::days(1);
                continue;
            };

            for technician in technicians.iter().filter(|t| t.active) {
                let Some(shift) = technician.working_hours.for_weekday(weekday) else {
                    continue;
                };

                // Intersect business hours with the technician's shift
                let mut start = open.open.max(shift.open);
                let end = open.close.min(shift.close);
                if day == window_start.date_naive() {
                    start = start.max(window_start.time());
                }
                let end = if day == last_day {
                    end.min(window_end.time())
                } else {
                    end
                };
                if start >= end {
                    continue;
                }

                // Subtract existing bookings and blocked intervals
                let entries = self
                    .calendar
                    .entries_for(criteria.tenant_id, technician.id, day)
                    .await?;
                let busy: Vec<(NaiveTime, NaiveTime)> =
                    entries.iter().map(|e| (e.start, e.end)).collect();
                let free = subtract_intervals((start, end), &busy);

                for (free_start, free_end) in free {
                    if emergency {
                        // One contiguous arrival window per free interval
                        let span = (free_end - free_start).num_minutes();
                        if span >= slot_minutes.min(60) {
                            slots.push(self.make_slot(
                                criteria,
                                technician,
                                day,
                                free_start,
                                free_end.min(free_start + Duration::minutes(slot_minutes)),
                                true,
                            ));
                        }
                        continue;
                    }

                    let mut cursor = free_start;
                    while cursor + Duration::minutes(slot_minutes) <= free_end {
                        let slot_end = cursor + Duration::minutes(slot_minutes);
                        slots.push(self.make_slot(
                            criteria, technician, day, cursor, slot_end, false,
                        ));
                        cursor = slot_end;
                    }
                }
            }

            day += Duration::days(1);
        }

        // Earliest start; preferred sorts before non-preferred within a day
        slots.sort_by_key(|s| (s.date, !s.preferred, s.start, s.technician_id));
        slots.truncate(criteria.limit);
        Ok(slots)
    }

    fn make_slot(
        &self,
        criteria: &SlotCriteria,
        technician: &Worker,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        emergency: bool,
    ) -> TimeSlot {
        let date_matches = criteria
            .preferred_date
            .map(|d| d == date)
            .unwrap_or(false);
        let window_matches = criteria
            .preferred_window
            .map(|w| {
                let (ws, we) = w.bounds();
                start >= ws && start < we
            })
            .unwrap_or(false);
        let preferred = match (criteria.preferred_date, criteria.preferred_window) {
            (None, None) => false,
            (Some(_), None) => date_matches,
            (None, Some(_)) => window_matches,
            (Some(_), Some(_)) => date_matches && window_matches,
        };

        TimeSlot {
            date,
            start,
            end,
            technician_id: technician.id,
            technician_name: Some(technician.name.clone()),
            preferred,
            emergency,
        }
    }

    /// Book a slot for a job.
    ///
    /// Takes the logical lock for `(tenant, technician, date, start)`,
    /// re-checks availability inside the lock, then appends the calendar
    /// entry. A slot taken between search and book fails with
    /// `SlotUnavailable` so the caller can re-run the search.
    pub async fn book(
        &self,
        slot: &TimeSlot,
        tenant: TenantId,
        job_id: Uuid,
    ) -> Result<CalendarEntry, SchedulingError> {
        let key: SlotKey = (tenant, slot.technician_id, slot.date, slot.start);
        let lock = self
            .booking_locks
            .lock()
            .entry(key)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Lost-update guard: somebody may have booked between search and now
        let entries = self
            .calendar
            .entries_for(tenant, slot.technician_id, slot.date)
            .await?;
        let conflict = entries.iter().any(|e| e.overlaps(slot.start, slot.end));
        if conflict {
            return Err(SchedulingError::SlotUnavailable);
        }

        let entry = CalendarEntry::booking(
            tenant,
            slot.technician_id,
            slot.date,
            slot.start,
            slot.end,
            job_id,
        );

        match self.calendar.append(entry).await {
            Ok(entry) => {
                tracing::info!(
                    tenant = %tenant,
                    technician = %slot.technician_id,
                    date = %slot.date,
                    start = %slot.start,
                    "Slot booked"
                );
                Ok(entry)
            }
            Err(StorageError::Conflict(_)) => Err(SchedulingError::SlotUnavailable),
            Err(e) => Err(e.into()),
        }
    }
}

/// Remove busy intervals from one open interval
fn subtract_intervals(
    open: (NaiveTime, NaiveTime),
    busy: &[(NaiveTime, NaiveTime)],
) -> Vec<(NaiveTime, NaiveTime)> {
    let mut free = vec![open];

    for &(busy_start, busy_end) in busy {
        let mut next = Vec::new();
        for (start, end) in free {
            if busy_end <= start || busy_start >= end {
                next.push((start, end));
                continue;
            }
            if busy_start > start {
                next.push((start, busy_start));
            }
            if busy_end < end {
                next.push((busy_end, end));
            }
        }
        free = next;
    }

    free
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_agent_core::TradeCategory;
    use call_agent_storage::MemoryCalendarStore;
    use chrono::{Datelike, TimeZone};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn technician(tenant: TenantId) -> Worker {
        Worker::new(
            tenant,
            Uuid::new_v4(),
            "Hans Müller",
            vec![TradeCategory::PlumbingHeating],
        )
    }

    /// Monday 2025-06-02, 07:00 UTC
    fn monday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 7, 0, 0).unwrap()
    }

    fn engine() -> SchedulingEngine {
        SchedulingEngine::new(Arc::new(MemoryCalendarStore::new()))
    }

    #[test]
    fn test_subtract_intervals() {
        let free = subtract_intervals((t(8, 0), t(17, 0)), &[(t(10, 0), t(11, 0))]);
        assert_eq!(free, vec![(t(8, 0), t(10, 0)), (t(11, 0), t(17, 0))]);

        let free = subtract_intervals((t(8, 0), t(12, 0)), &[(t(7, 0), t(13, 0))]);
        assert!(free.is_empty());
    }

    #[tokio::test]
    async fn test_find_slots_normal_job() {
        let tenant = TenantId::new();
        let tech = technician(tenant);
        let criteria = SlotCriteria::new(tenant, Urgency::Normal, JobType::Repair);

        let slots = engine()
            .find_slots(
                &criteria,
                &BusinessHours::standard(),
                &[tech.clone()],
                monday_morning(),
            )
            .await
            .unwrap();

        assert!(!slots.is_empty());
        assert!(slots.len() <= 10);
        // Standard shift starts 08:00, business hours 07:00: intersection wins
        assert_eq!(slots[0].start, t(8, 0));
        assert_eq!(slots[0].end, t(9, 0));
        assert_eq!(slots[0].technician_id, tech.id);
    }

    #[tokio::test]
    async fn test_urgency_deadline_bounds_window() {
        let tenant = TenantId::new();
        let tech = technician(tenant);
        // Emergency: at most 2 hours out
        let criteria = SlotCriteria::new(tenant, Urgency::Emergency, JobType::Emergency);

        let slots = engine()
            .find_slots(
                &criteria,
                &BusinessHours::standard(),
                &[tech],
                monday_morning(),
            )
            .await
            .unwrap();

        assert!(!slots.is_empty());
        for slot in &slots {
            assert!(slot.emergency);
            assert_eq!(slot.date, monday_morning().date_naive());
            assert!(slot.start < t(9, 1));
        }
    }

    #[tokio::test]
    async fn test_booked_interval_excluded() {
        let tenant = TenantId::new();
        let tech = technician(tenant);
        let calendar = Arc::new(MemoryCalendarStore::new());
        let date = monday_morning().date_naive();

        calendar
            .append(CalendarEntry::booking(
                tenant,
                tech.id,
                date,
                t(8, 0),
                t(9, 0),
                Uuid::new_v4(),
            ))
            .await
            .unwrap();

        let engine = SchedulingEngine::new(calendar);
        let criteria = SlotCriteria::new(tenant, Urgency::Normal, JobType::Repair);
        let slots = engine
            .find_slots(
                &criteria,
                &BusinessHours::standard(),
                &[tech],
                monday_morning(),
            )
            .await
            .unwrap();

        assert!(slots
            .iter()
            .all(|s| !(s.date == date && s.start == t(8, 0))));
        assert_eq!(slots[0].start, t(9, 0));
    }

    #[tokio::test]
    async fn test_preferred_window_flag() {
        let tenant = TenantId::new();
        let tech = technician(tenant);
        let mut criteria = SlotCriteria::new(tenant, Urgency::Normal, JobType::Repair);
        criteria.preferred_window = Some(TimeWindow::Vormittag);

        let slots = engine()
            .find_slots(
                &criteria,
                &BusinessHours::standard(),
                &[tech],
                monday_morning(),
            )
            .await
            .unwrap();

        let morning = slots.iter().find(|s| s.start == t(8, 0)).unwrap();
        assert!(morning.preferred);
        let afternoon = slots.iter().find(|s| s.start >= t(13, 0));
        if let Some(afternoon) = afternoon {
            assert!(!afternoon.preferred);
        }
    }

    #[tokio::test]
    async fn test_book_then_rebook_fails() {
        let tenant = TenantId::new();
        let tech = technician(tenant);
        let engine = engine();
        let criteria = SlotCriteria::new(tenant, Urgency::Normal, JobType::Repair);

        let slots = engine
            .find_slots(
                &criteria,
                &BusinessHours::standard(),
                &[tech],
                monday_morning(),
            )
            .await
            .unwrap();
        let slot = slots[0].clone();

        engine.book(&slot, tenant, Uuid::new_v4()).await.unwrap();
        let second = engine.book(&slot, tenant, Uuid::new_v4()).await;
        assert!(matches!(second, Err(SchedulingError::SlotUnavailable)));
    }

    #[tokio::test]
    async fn test_concurrent_booking_single_winner() {
        let tenant = TenantId::new();
        let tech = technician(tenant);
        let engine = Arc::new(engine());
        let criteria = SlotCriteria::new(tenant, Urgency::Normal, JobType::Repair);

        let slots = engine
            .find_slots(
                &criteria,
                &BusinessHours::standard(),
                &[tech],
                monday_morning(),
            )
            .await
            .unwrap();
        let slot = slots[0].clone();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            let slot = slot.clone();
            handles.push(tokio::spawn(async move {
                engine.book(&slot, tenant, Uuid::new_v4()).await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_sunday_closed() {
        let tenant = TenantId::new();
        let tech = technician(tenant);
        // Sunday 2025-06-01 08:00
        let sunday = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let criteria = SlotCriteria::new(tenant, Urgency::Emergency, JobType::Emergency);

        let slots = engine()
            .find_slots(&criteria, &BusinessHours::standard(), &[tech], sunday)
            .await
            .unwrap();

        // Emergency window is 2h; the whole window falls on closed Sunday
        assert!(slots.is_empty());
    }
}
