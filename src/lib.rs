//! # otp-relay
//!
//! Chat bot that fetches one-time-password codes from an IMAP inbox on request.
//!
//! A user runs `/otp someone@example.com`; the bot searches the configured
//! inbox for messages addressed to that recipient, extracts a numeric code with
//! an ordered set of patterns and replies with it, or with a failure once the
//! search budget runs out.
//!
//! The crate is layered so the interesting parts are usable without a chat
//! platform:
//!
//! - [`matcher`]: ordered, first-match-wins OTP extraction ([`OtpExtractor`])
//! - [`mailbox`]: the [`Mailbox`] seam and its IMAP implementation ([`ImapMailbox`])
//! - [`poller`]: bounded, time-boxed searches ([`OtpSearcher`])
//! - [`commands`]: platform-agnostic `otp` / `quick_otp` / `ping` handling
//! - [`discord`]: the Discord gateway adapter used by the binary
//!
//! ## Extracting a code
//!
//! ```
//! use otp_relay::OtpExtractor;
//!
//! let otp = OtpExtractor::new();
//! assert_eq!(otp.extract("", "Your code: **98765**").as_deref(), Some("98765"));
//! ```
//!
//! ## Searching a mailbox
//!
//! ```no_run
//! use otp_relay::{ImapConfig, ImapMailbox, OtpSearcher, PollingConfig, SearchMode};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> otp_relay::Result<()> {
//! let config = ImapConfig::builder()
//!     .email("otp-inbox@example.com")
//!     .password("app-password")
//!     .imap_host("imap.example.com")
//!     .build()?;
//!
//! let searcher = Arc::new(OtpSearcher::new(
//!     Arc::new(ImapMailbox::new(config)),
//!     PollingConfig::default(),
//! ));
//! let request = searcher.request(
//!     "someone@example.com",
//!     SearchMode::WaitForNew,
//!     Duration::from_secs(60),
//! )?;
//! let outcome = searcher.search(&request).await;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Observability
//!
//! All major operations emit `tracing` spans:
//!
//! - `OtpSearcher::search` - one bounded search (`target`, `mode`, `timeout_secs`)
//! - `ImapMailbox::fetch_recent` - one scoped IMAP conversation
//! - `session::*`, `connection::establish_tls` - individual protocol steps
//! - `CommandHandler::handle` - one chat command
//!
//! Codes are only logged at `debug` level.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod commands;
pub mod config;
pub mod discord;
pub mod error;
pub mod mailbox;
pub mod matcher;
pub mod poller;

// Internal modules
mod client;
mod connection;
mod parser;
mod session;

// Re-exports for ergonomic API
pub use client::ImapMailbox;
pub use commands::{Command, CommandHandler, Reply};
pub use config::{BotConfig, ImapConfig, ImapConfigBuilder, PollingConfig, TimeoutConfig};
pub use email_address::EmailAddress;
pub use error::{Error, ErrorCategory, Result};
pub use mailbox::{EmailMessage, Mailbox};
pub use matcher::{Matcher, OtpExtractor};
pub use poller::{OtpSearcher, SearchHandle, SearchMode, SearchOutcome, SearchRequest};
