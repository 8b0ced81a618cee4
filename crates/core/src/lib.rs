//! Core types for the call agent
//!
//! This crate provides foundational types used across all other crates:
//! - Audio frame types and processing
//! - Transcript and conversation types
//! - Domain entities (tenants, contacts, jobs, workers, routing rules)
//! - Error types

pub mod audio;
pub mod contact;
pub mod conversation;
pub mod error;
pub mod job;
pub mod routing;
pub mod tenant;
pub mod transcript;
pub mod worker;

pub use audio::{AudioFrame, Channels, SampleRate};
pub use contact::{Address, Contact, GeoPoint, PropertyType};
pub use conversation::{MessageWindow, Turn, TurnRole};
pub use error::{CoreError, Result};
pub use job::{
    Job, JobDraft, JobHistoryEntry, JobNumber, JobSource, JobStatus, JobType, TradeCategory,
    Urgency,
};
pub use routing::{RoutingAction, RoutingRule, RuleConditions};
pub use tenant::{BusinessHours, DayHours, Tenant, TenantId};
pub use transcript::TranscriptResult;
pub use worker::{Certification, Department, Qualification, Worker, WorkerRole, WorkingHours};
