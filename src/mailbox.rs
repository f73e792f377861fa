//! The mailbox query seam between the poller and the mail server.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A message as seen by the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Decoded `Subject` header, empty if absent.
    pub subject: String,
    /// Text body (plain text preferred over HTML).
    pub body: String,
    /// When the message was sent or received by the server.
    pub received_at: DateTime<Utc>,
    /// Decoded `To` header, empty if absent.
    pub recipient: String,
}

impl EmailMessage {
    /// Returns `true` if the message arrived no earlier than `window` before `now`.
    #[must_use]
    pub fn is_fresh(&self, window: Duration, now: DateTime<Utc>) -> bool {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        now.signed_duration_since(self.received_at) <= window
    }
}

/// Read-only access to a remote inbox.
///
/// Implementations acquire whatever connection they need per call and release
/// it before returning, so nothing is held across the poller's sleeps.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Returns up to `limit` messages addressed to `recipient`, newest first.
    async fn fetch_recent(&self, recipient: &str, limit: usize) -> Result<Vec<EmailMessage>>;
}
