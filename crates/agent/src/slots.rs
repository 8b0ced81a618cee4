//! Slot filling
//!
//! Extracts structured intake fields from free text across multiple turns
//! and tracks which slots are still outstanding.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use call_agent_core::Address;
use call_agent_scheduling::TimeWindow;

/// Intake fields collected during a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKey {
    Problem,
    Name,
    Phone,
    Address,
    PreferredTime,
}

impl SlotKey {
    /// Fill order: the most important outstanding slot is prompted first
    pub const PRIORITY: [SlotKey; 5] = [
        SlotKey::Problem,
        SlotKey::Name,
        SlotKey::Phone,
        SlotKey::Address,
        SlotKey::PreferredTime,
    ];
}

/// Parsed preferred time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferredTime {
    /// Relative day offset from today (0 = today, 1 = tomorrow)
    pub day_offset: Option<i64>,
    pub date: Option<NaiveDate>,
    pub window: Option<TimeWindow>,
    pub raw: String,
}

/// Mutable slot store owned by the session
#[derive(Debug, Default)]
pub struct SlotStore {
    values: HashMap<SlotKey, String>,
    address: Option<Address>,
    preferred: Option<PreferredTime>,
}

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: SlotKey) -> Option<&str> {
        self.values.get(&key).map(|s| s.as_str())
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn preferred_time(&self) -> Option<&PreferredTime> {
        self.preferred.as_ref()
    }

    pub fn is_filled(&self, key: SlotKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Highest-priority slot still missing
    pub fn next_missing(&self) -> Option<SlotKey> {
        SlotKey::PRIORITY
            .iter()
            .copied()
            .find(|k| !self.is_filled(*k))
    }

    pub fn all_filled(&self) -> bool {
        self.next_missing().is_none()
    }

    pub fn set(&mut self, key: SlotKey, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    /// Extract whatever the utterance offers; `expected` biases free-form
    /// answers towards the slot that was just prompted for.
    pub fn ingest(&mut self, text: &str, expected: Option<SlotKey>) -> Vec<SlotKey> {
        let mut filled = Vec::new();

        if let Some(phone) = extract_phone(text) {
            if !self.is_filled(SlotKey::Phone) {
                self.set(SlotKey::Phone, phone);
                filled.push(SlotKey::Phone);
            }
        }

        if let Some(address) = extract_address(text) {
            if !self.is_filled(SlotKey::Address) {
                self.set(SlotKey::Address, address.display_line());
                self.address = Some(address);
                filled.push(SlotKey::Address);
            }
        }

        if let Some(preferred) = extract_preferred_time(text) {
            if !self.is_filled(SlotKey::PreferredTime) {
                self.set(SlotKey::PreferredTime, preferred.raw.clone());
                self.preferred = Some(preferred);
                filled.push(SlotKey::PreferredTime);
            }
        }

        if !self.is_filled(SlotKey::Name) {
            if let Some(name) = extract_name(text, expected == Some(SlotKey::Name)) {
                self.set(SlotKey::Name, name);
                filled.push(SlotKey::Name);
            }
        }

        // The problem description is whatever the caller said when asked
        if expected == Some(SlotKey::Problem) && !self.is_filled(SlotKey::Problem) && !filled
            .iter()
            .any(|k| matches!(k, SlotKey::Phone | SlotKey::Address))
        {
            self.set(SlotKey::Problem, text.trim());
            filled.push(SlotKey::Problem);
        }

        filled
    }

    /// One-line summary for the confirmation turn
    pub fn summary(&self) -> String {
        let field = |key: SlotKey| self.get(key).unwrap_or("-").to_string();
        format!(
            "{}, {}, {}, Termin: {}",
            field(SlotKey::Name),
            field(SlotKey::Phone),
            field(SlotKey::Address),
            field(SlotKey::PreferredTime),
        )
    }
}

fn extract_phone(text: &str) -> Option<String> {
    // German numbers, tolerant of spacing: +49 30 1234567, 030 1234567
    let re = Regex::new(r"(\+49[\s\-/]?|0)(\d[\s\-/]?){6,14}\d").ok()?;
    let matched = re.find(text)?.as_str();
    let cleaned: String = matched
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if cleaned.len() < 7 {
        return None;
    }
    Some(cleaned)
}

fn extract_address(text: &str) -> Option<Address> {
    // "Musterstr. 1, 10115 Berlin"
    let re = Regex::new(
        r"(?P<street>[A-ZÄÖÜ][\wäöüß\.\-]+(?:\s[\wäöüß\.\-]+)*?)\s+(?P<nr>\d+[a-z]?)\s*,\s*(?P<plz>\d{5})\s+(?P<city>[A-ZÄÖÜ][\wäöüß\-]+)",
    )
    .ok()?;
    let caps = re.captures(text)?;
    Address::new(
        caps["street"].to_string(),
        caps["nr"].to_string(),
        caps["plz"].to_string(),
        caps["city"].to_string(),
    )
    .ok()
}

fn extract_preferred_time(text: &str) -> Option<PreferredTime> {
    let lower = text.to_lowercase();
    let window = TimeWindow::parse(&lower);

    let day_offset = if lower.contains("übermorgen") {
        Some(2)
    } else if lower.contains("morgen") && !lower.contains("guten morgen") {
        Some(1)
    } else if lower.contains("heute") || lower.contains("sofort") {
        Some(0)
    } else {
        None
    };

    if window.is_none() && day_offset.is_none() {
        return None;
    }

    Some(PreferredTime {
        day_offset,
        date: None,
        window,
        raw: text.trim().to_string(),
    })
}

fn extract_name(text: &str, expected: bool) -> Option<String> {
    let lower = text.to_lowercase();

    for marker in ["mein name ist ", "ich heiße ", "ich heisse ", "hier ist "] {
        if let Some(idx) = lower.find(marker) {
            let rest = text[idx + marker.len()..].trim();
            let name: String = rest
                .split_whitespace()
                .take(3)
                .collect::<Vec<_>>()
                .join(" ");
            let name = name.trim_end_matches(['.', ',', '!']).to_string();
            if !name.is_empty() {
                return Some(name);
            }
        }
    }

    if !expected {
        return None;
    }

    // Answer to "Wie ist Ihr Name?": two or three capitalized words
    let words: Vec<&str> = text.split_whitespace().collect();
    if (2..=3).contains(&words.len())
        && words
            .iter()
            .all(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
    {
        return Some(
            words
                .join(" ")
                .trim_end_matches(['.', ',', '!'])
                .to_string(),
        );
    }
    None
}
