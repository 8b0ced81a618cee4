//! Named German time windows and speech formatting

use chrono::{Datelike, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::engine::TimeSlot;

/// Customary appointment windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// 07:00-10:00
    Frueh,
    /// 08:00-12:00
    Vormittag,
    /// 11:00-14:00
    Mittag,
    /// 13:00-17:00
    Nachmittag,
    /// 16:00-19:00
    Spaet,
    /// 18:00-20:00, emergencies only
    Abend,
}

impl TimeWindow {
    pub fn bounds(&self) -> (NaiveTime, NaiveTime) {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        match self {
            TimeWindow::Frueh => (t(7, 0), t(10, 0)),
            TimeWindow::Vormittag => (t(8, 0), t(12, 0)),
            TimeWindow::Mittag => (t(11, 0), t(14, 0)),
            TimeWindow::Nachmittag => (t(13, 0), t(17, 0)),
            TimeWindow::Spaet => (t(16, 0), t(19, 0)),
            TimeWindow::Abend => (t(18, 0), t(20, 0)),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TimeWindow::Frueh => "Früh (7-10 Uhr)",
            TimeWindow::Vormittag => "Vormittags (8-12 Uhr)",
            TimeWindow::Mittag => "Mittags (11-14 Uhr)",
            TimeWindow::Nachmittag => "Nachmittags (13-17 Uhr)",
            TimeWindow::Spaet => "Spätnachmittags (16-19 Uhr)",
            TimeWindow::Abend => "Abends (18-20 Uhr)",
        }
    }

    /// Window containing the given time, if any
    pub fn containing(t: NaiveTime) -> Option<TimeWindow> {
        [
            TimeWindow::Frueh,
            TimeWindow::Vormittag,
            TimeWindow::Mittag,
            TimeWindow::Nachmittag,
            TimeWindow::Spaet,
            TimeWindow::Abend,
        ]
        .into_iter()
        .find(|w| {
            let (start, end) = w.bounds();
            t >= start && t < end
        })
    }

    /// Parse from customer phrasing ("vormittag", "nachmittags")
    pub fn parse(text: &str) -> Option<TimeWindow> {
        let text = text.to_lowercase();
        if text.contains("früh") || text.contains("frueh") {
            Some(TimeWindow::Frueh)
        } else if text.contains("vormittag") || text.contains("morgen früh") {
            Some(TimeWindow::Vormittag)
        } else if text.contains("mittag") && !text.contains("nach") {
            Some(TimeWindow::Mittag)
        } else if text.contains("nachmittag") {
            Some(TimeWindow::Nachmittag)
        } else if text.contains("spät") || text.contains("spaet") {
            Some(TimeWindow::Spaet)
        } else if text.contains("abend") {
            Some(TimeWindow::Abend)
        } else {
            None
        }
    }
}

const WEEKDAYS_DE: [&str; 7] = [
    "Montag",
    "Dienstag",
    "Mittwoch",
    "Donnerstag",
    "Freitag",
    "Samstag",
    "Sonntag",
];

/// "Dienstag, den 03.06., 08:00 bis 08:30 Uhr mit Hans Müller"
pub fn format_slot_for_speech(slot: &TimeSlot) -> String {
    let day_name = WEEKDAYS_DE[slot.date.weekday().num_days_from_monday() as usize];
    let date_str = slot.date.format("%d.%m.");
    let tech = slot
        .technician_name
        .as_deref()
        .map(|n| format!(" mit {}", n))
        .unwrap_or_default();

    format!(
        "{}, den {}, {} bis {} Uhr{}",
        day_name,
        date_str,
        slot.start.format("%H:%M"),
        slot.end.format("%H:%M"),
        tech
    )
}

/// Offer up to `max_slots` options in one utterance
pub fn format_slots_for_speech(slots: &[TimeSlot], max_slots: usize) -> String {
    if slots.is_empty() {
        return "Leider habe ich aktuell keine freien Termine gefunden.".to_string();
    }

    let slots = &slots[..slots.len().min(max_slots)];
    if slots.len() == 1 {
        return format!(
            "Ich kann Ihnen folgenden Termin anbieten: {}",
            format_slot_for_speech(&slots[0])
        );
    }

    let options: Vec<String> = slots
        .iter()
        .enumerate()
        .map(|(i, slot)| format!("Option {}: {}", i + 1, format_slot_for_speech(slot)))
        .collect();
    format!(
        "Ich kann Ihnen folgende Termine anbieten: {}",
        options.join(". ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn test_window_parse() {
        assert_eq!(TimeWindow::parse("morgen vormittag"), Some(TimeWindow::Vormittag));
        assert_eq!(TimeWindow::parse("lieber nachmittags"), Some(TimeWindow::Nachmittag));
        assert_eq!(TimeWindow::parse("egal wann"), None);
    }

    #[test]
    fn test_containing() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(TimeWindow::containing(nine), Some(TimeWindow::Frueh));

        let night = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        assert_eq!(TimeWindow::containing(night), None);
    }

    #[test]
    fn test_speech_format() {
        let slot = TimeSlot {
            date: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            technician_id: Uuid::new_v4(),
            technician_name: Some("Hans Müller".to_string()),
            preferred: false,
            emergency: false,
        };

        let text = format_slot_for_speech(&slot);
        assert!(text.starts_with("Dienstag, den 03.06."));
        assert!(text.ends_with("mit Hans Müller"));
    }
}
