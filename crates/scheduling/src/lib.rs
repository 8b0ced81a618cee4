//! Appointment scheduling
//!
//! Slot search over the intersection of tenant business hours and technician
//! working hours, minus existing bookings and blocked intervals, bounded by
//! the urgency deadline. Booking takes a per-slot logical lock and re-checks
//! availability so concurrent bookings of the same slot resolve to exactly
//! one winner.

mod engine;
mod windows;

pub use engine::{SchedulingEngine, SlotCriteria, TimeSlot};
pub use windows::{format_slot_for_speech, format_slots_for_speech, TimeWindow};

use thiserror::Error;

/// Scheduling errors
#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Storage error: {0}")]
    Storage(#[from] call_agent_storage::StorageError),

    #[error("Slot no longer available")]
    SlotUnavailable,

    #[error("No slots found in the search window")]
    NoSlotsFound,
}
