//! Mock mailboxes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use otp_relay::{EmailMessage, Error, Mailbox, PollingConfig, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn message(to: &str, subject: &str, body: &str, received_at: DateTime<Utc>) -> EmailMessage {
    EmailMessage {
        subject: subject.to_string(),
        body: body.to_string(),
        received_at,
        recipient: to.to_string(),
    }
}

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::minutes(minutes)
}

pub fn polling() -> PollingConfig {
    PollingConfig::default()
}

pub fn mailbox_fault() -> Error {
    Error::TcpConnect {
        target: "imap.example.com:993".into(),
        source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
    }
}

/// Returns canned messages per recipient and records every query.
#[derive(Default)]
pub struct StaticMailbox {
    inboxes: HashMap<String, Vec<EmailMessage>>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl StaticMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds messages for a recipient, newest first.
    pub fn with(mut self, recipient: &str, messages: Vec<EmailMessage>) -> Self {
        self.inboxes.insert(recipient.to_string(), messages);
        self
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailbox for StaticMailbox {
    async fn fetch_recent(&self, recipient: &str, limit: usize) -> Result<Vec<EmailMessage>> {
        self.calls
            .lock()
            .unwrap()
            .push((recipient.to_string(), limit));
        Ok(self
            .inboxes
            .get(recipient)
            .map(|messages| messages.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Fails the first `failures` calls, then serves `messages`.
pub struct FlakyMailbox {
    failures: usize,
    messages: Vec<EmailMessage>,
    calls: AtomicUsize,
}

impl FlakyMailbox {
    pub fn new(failures: usize, messages: Vec<EmailMessage>) -> Self {
        Self {
            failures,
            messages,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self::new(usize::MAX, Vec::new())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailbox for FlakyMailbox {
    async fn fetch_recent(&self, _recipient: &str, limit: usize) -> Result<Vec<EmailMessage>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(mailbox_fault());
        }
        Ok(self.messages.iter().take(limit).cloned().collect())
    }
}

/// Serves nothing until `delay` has elapsed on the tokio clock.
pub struct DelayedMailbox {
    delivered_at: tokio::time::Instant,
    messages: Vec<EmailMessage>,
}

impl DelayedMailbox {
    pub fn new(delay: Duration, messages: Vec<EmailMessage>) -> Self {
        Self {
            delivered_at: tokio::time::Instant::now() + delay,
            messages,
        }
    }
}

#[async_trait]
impl Mailbox for DelayedMailbox {
    async fn fetch_recent(&self, _recipient: &str, limit: usize) -> Result<Vec<EmailMessage>> {
        if tokio::time::Instant::now() < self.delivered_at {
            return Ok(Vec::new());
        }
        Ok(self.messages.iter().take(limit).cloned().collect())
    }
}

/// Never answers within `delay`; serves `messages` once it does.
pub struct HangingMailbox {
    delay: Duration,
    messages: Vec<EmailMessage>,
    calls: AtomicUsize,
}

impl HangingMailbox {
    pub fn new(delay: Duration, messages: Vec<EmailMessage>) -> Self {
        Self {
            delay,
            messages,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailbox for HangingMailbox {
    async fn fetch_recent(&self, _recipient: &str, limit: usize) -> Result<Vec<EmailMessage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.messages.iter().take(limit).cloned().collect())
    }
}
