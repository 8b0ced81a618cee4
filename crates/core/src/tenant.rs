//! Tenant types
//!
//! Every persisted entity carries a tenant id; stores must filter by it.

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::contact::GeoPoint;

/// Tenant identifier, the isolation boundary for all data access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Open/close times for a single weekday
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl DayHours {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self { open, close }
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        t >= self.open && t < self.close
    }
}

/// Weekly business hours
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessHours {
    /// Weekday -> hours; missing weekday means closed
    pub days: HashMap<String, DayHours>,
}

impl BusinessHours {
    /// Standard trades hours: Mon-Fri 07:00-18:00, Sat 08:00-12:00
    pub fn standard() -> Self {
        let mut days = HashMap::new();
        let weekday = DayHours::new(
            NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        );
        for day in ["mon", "tue", "wed", "thu", "fri"] {
            days.insert(day.to_string(), weekday);
        }
        days.insert(
            "sat".to_string(),
            DayHours::new(
                NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            ),
        );
        Self { days }
    }

    pub fn for_weekday(&self, weekday: Weekday) -> Option<DayHours> {
        self.days.get(weekday_key(weekday)).copied()
    }

    pub fn is_open(&self, weekday: Weekday, t: NaiveTime) -> bool {
        self.for_weekday(weekday).is_some_and(|h| h.contains(t))
    }
}

pub(crate) fn weekday_key(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

/// Tenant account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Default IETF language tag, e.g. "de-DE"
    pub default_language: String,
    pub business_hours: BusinessHours,
    /// Headquarters location used for distance calculations
    pub hq_location: Option<GeoPoint>,
    /// Service radius in kilometers
    pub service_radius_km: f64,
    /// Preferred trade category used as a triage tie-break
    pub preferred_trade: Option<String>,
    /// Emergency transfer destination (E.164 or extension)
    pub emergency_number: Option<String>,
    pub active: bool,
}

impl Tenant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TenantId::new(),
            name: name.into(),
            default_language: "de-DE".to_string(),
            business_hours: BusinessHours::standard(),
            hq_location: None,
            service_radius_km: 30.0,
            preferred_trade: None,
            emergency_number: None,
            active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_hours() {
        let hours = BusinessHours::standard();
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let evening = NaiveTime::from_hms_opt(19, 0, 0).unwrap();

        assert!(hours.is_open(Weekday::Mon, nine));
        assert!(!hours.is_open(Weekday::Mon, evening));
        assert!(!hours.is_open(Weekday::Sun, nine));
    }

    #[test]
    fn test_saturday_reduced() {
        let hours = BusinessHours::standard();
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let fourteen = NaiveTime::from_hms_opt(14, 0, 0).unwrap();

        assert!(hours.is_open(Weekday::Sat, ten));
        assert!(!hours.is_open(Weekday::Sat, fourteen));
    }
}
