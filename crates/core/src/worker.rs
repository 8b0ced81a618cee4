//! Worker (technician) and department types

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::contact::GeoPoint;
use crate::job::{TradeCategory, Urgency};
use crate::tenant::{weekday_key, DayHours, TenantId};

/// Role within a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRole {
    Owner,
    Admin,
    Worker,
}

/// German trade qualification ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Qualification {
    Helfer,
    Lehrling,
    Facharbeiter,
    Geselle,
    Meister,
}

/// Professional certifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Certification {
    GasPermit,
    ElectricalPermit,
    RefrigerantHandling,
    Welding,
    AsbestosRemoval,
}

/// Weekly working hours, weekday -> shift
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkingHours {
    pub days: HashMap<String, DayHours>,
}

impl WorkingHours {
    /// Mon-Fri 08:00-17:00
    pub fn standard() -> Self {
        let mut days = HashMap::new();
        let shift = DayHours::new(
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        );
        for day in ["mon", "tue", "wed", "thu", "fri"] {
            days.insert(day.to_string(), shift);
        }
        Self { days }
    }

    pub fn for_weekday(&self, weekday: Weekday) -> Option<DayHours> {
        self.days.get(weekday_key(weekday)).copied()
    }

    pub fn is_working(&self, weekday: Weekday, t: NaiveTime) -> bool {
        self.for_weekday(weekday).is_some_and(|h| h.contains(t))
    }
}

/// Logical group of workers within a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub name: String,
    /// Trades this department accepts
    pub trades: Vec<TradeCategory>,
    /// Urgency levels this department accepts
    pub urgencies: Vec<Urgency>,
    /// Contact used when no technician is available for an emergency
    pub fallback_contact: Option<String>,
    pub active: bool,
}

impl Department {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, trades: Vec<TradeCategory>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            trades,
            urgencies: vec![
                Urgency::Emergency,
                Urgency::Urgent,
                Urgency::Normal,
                Urgency::Routine,
            ],
            fallback_contact: None,
            active: true,
        }
    }

    pub fn handles_trade(&self, trade: TradeCategory) -> bool {
        self.trades.contains(&trade)
    }
}

/// Technician profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub department_id: Uuid,
    pub name: String,
    pub phone: String,
    pub role: WorkerRole,
    pub qualification: Qualification,
    pub trades: Vec<TradeCategory>,
    pub certifications: Vec<Certification>,
    pub working_hours: WorkingHours,
    pub home_base: Option<GeoPoint>,
    /// Jobs currently assigned for today
    pub current_jobs: u32,
    pub max_jobs_per_day: u32,
    pub on_emergency_duty: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Worker {
    pub fn new(
        tenant_id: TenantId,
        department_id: Uuid,
        name: impl Into<String>,
        trades: Vec<TradeCategory>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            department_id,
            name: name.into(),
            phone: String::new(),
            role: WorkerRole::Worker,
            qualification: Qualification::Geselle,
            trades,
            certifications: Vec::new(),
            working_hours: WorkingHours::standard(),
            home_base: None,
            current_jobs: 0,
            max_jobs_per_day: 6,
            on_emergency_duty: false,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn can_handle(&self, trade: TradeCategory) -> bool {
        self.trades.contains(&trade)
    }

    pub fn has_certification(&self, cert: Certification) -> bool {
        self.certifications.contains(&cert)
    }

    /// Remaining job slots for today
    pub fn remaining_jobs(&self) -> u32 {
        self.max_jobs_per_day.saturating_sub(self.current_jobs)
    }

    /// Workload headroom in [0, 1]
    pub fn headroom(&self) -> f64 {
        if self.max_jobs_per_day == 0 {
            return 0.0;
        }
        (1.0 - self.current_jobs as f64 / self.max_jobs_per_day as f64).clamp(0.0, 1.0)
    }

    /// Available for new work right now
    pub fn is_available(&self, weekday: Weekday, t: NaiveTime) -> bool {
        self.active && self.remaining_jobs() > 0 && self.working_hours.is_working(weekday, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headroom() {
        let tenant = TenantId::new();
        let dept = Uuid::new_v4();
        let mut worker = Worker::new(tenant, dept, "Hans Müller", vec![TradeCategory::PlumbingHeating]);

        assert_eq!(worker.headroom(), 1.0);
        worker.current_jobs = 3;
        assert_eq!(worker.headroom(), 0.5);
        worker.current_jobs = 9;
        assert_eq!(worker.headroom(), 0.0);
    }

    #[test]
    fn test_availability_requires_active() {
        let tenant = TenantId::new();
        let dept = Uuid::new_v4();
        let mut worker = Worker::new(tenant, dept, "Hans Müller", vec![TradeCategory::Electrical]);
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();

        assert!(worker.is_available(Weekday::Tue, ten));
        worker.active = false;
        assert!(!worker.is_available(Weekday::Tue, ten));
    }

    #[test]
    fn test_qualification_ordering() {
        assert!(Qualification::Meister > Qualification::Geselle);
        assert!(Qualification::Geselle > Qualification::Lehrling);
    }
}
