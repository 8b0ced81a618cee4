//! Notification channels
//!
//! External SMS/email gateways behind a trait; the simulated channels record
//! sent messages for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::JobError;

/// One outbound message
#[derive(Debug, Clone)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Outbound notification gateway
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), JobError>;

    /// Channel name for logging ("sms", "email")
    fn name(&self) -> &'static str;
}

/// Simulated SMS gateway recording all messages
pub struct SimulatedSmsChannel {
    sent: RwLock<Vec<Notification>>,
}

impl SimulatedSmsChannel {
    pub fn new() -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
        }
    }

    pub fn sent_messages(&self) -> Vec<Notification> {
        self.sent.read().clone()
    }
}

impl Default for SimulatedSmsChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for SimulatedSmsChannel {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), JobError> {
        self.sent.write().push(Notification {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            sent_at: Utc::now(),
        });
        tracing::debug!(recipient, "SMS queued");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sms"
    }
}

/// Simulated email gateway recording all messages
pub struct SimulatedEmailChannel {
    sent: RwLock<Vec<Notification>>,
}

impl SimulatedEmailChannel {
    pub fn new() -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
        }
    }

    pub fn sent_messages(&self) -> Vec<Notification> {
        self.sent.read().clone()
    }
}

impl Default for SimulatedEmailChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for SimulatedEmailChannel {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), JobError> {
        self.sent.write().push(Notification {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            sent_at: Utc::now(),
        });
        tracing::debug!(recipient, subject, "Email queued");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
