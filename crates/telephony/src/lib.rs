//! Telephony adapters
//!
//! Normalizes provider-specific call protocols into a unified event stream
//! and symmetric media streams. Real providers live behind the
//! [`TelephonyAdapter`] trait; the simulated adapter drives tests and local
//! development.

mod adapter;
mod events;
mod media;
mod webhook;

pub use adapter::{PlaybackHandle, SimulatedAdapter, TelephonyAdapter};
pub use events::{CallEvent, HangupCause};
pub use media::{resample, OutboundFrameQueue};
pub use webhook::{sign_webhook, verify_webhook_signature};

use thiserror::Error;

/// Telephony errors
#[derive(Error, Debug)]
pub enum TelephonyError {
    /// Retryable provider fault
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The call no longer exists at the provider; fatal for the session
    #[error("Call gone: {0}")]
    CallGone(uuid::Uuid),

    /// Transfer was rejected; the call remains active
    #[error("Transfer rejected: {0}")]
    TransferRejected(String),

    #[error("Webhook signature invalid")]
    SignatureInvalid,

    #[error("Webhook timestamp outside tolerance")]
    StaleTimestamp,

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
}
