//! Triage engine
//!
//! Pure assessment of a free-text problem description into urgency, trade
//! category, recommended action and reasoning. No I/O; the only inputs are
//! the description, the caller context and the tenant's rule table, so
//! identical inputs always produce identical outcomes.

mod engine;
mod rules;

pub use engine::{CallerContext, TriageEngine, TriageOutcome};
pub use rules::{RuleTable, TriageRule};
