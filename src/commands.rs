//! Platform-agnostic chat commands.
//!
//! A chat adapter turns an invocation into a [`Command`], wraps its reply
//! channel in a [`Reply`] implementation and hands both to
//! [`CommandHandler::handle`]. All replies are meant to be visible only to the
//! invoking user.

use crate::config::validate_target;
use crate::error::Result;
use crate::poller::{OtpSearcher, SearchMode, SearchOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Name of the option carrying the target address.
pub const EMAIL_OPTION: &str = "email";

/// Registration metadata for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Command name as typed by users.
    pub name: &'static str,
    /// Short help text.
    pub description: &'static str,
    /// Whether the command takes the required `email` option.
    pub takes_email: bool,
}

/// Every command the bot exposes.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "otp",
        description: "Get OTP code from your email (2 minute search)",
        takes_email: true,
    },
    CommandSpec {
        name: "quick_otp",
        description: "Quick OTP search (1 minute)",
        takes_email: true,
    },
    CommandSpec {
        name: "ping",
        description: "Check if the bot is responsive",
        takes_email: false,
    },
];

/// Help text for the `email` option.
pub const EMAIL_OPTION_DESCRIPTION: &str = "The email address to check for OTP codes";

/// A parsed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Scan existing mail, then wait for new mail.
    Otp {
        /// Raw, not yet validated address.
        email: String,
    },
    /// Scan existing mail only.
    QuickOtp {
        /// Raw, not yet validated address.
        email: String,
    },
    /// Liveness check.
    Ping,
}

impl Command {
    /// Builds a command from its name and `email` option.
    ///
    /// Returns `None` for unknown names or a missing required option.
    #[must_use]
    pub fn parse(name: &str, email: Option<&str>) -> Option<Self> {
        match name {
            "otp" => email.map(|e| Command::Otp {
                email: e.trim().to_string(),
            }),
            "quick_otp" => email.map(|e| Command::QuickOtp {
                email: e.trim().to_string(),
            }),
            "ping" => Some(Command::Ping),
            _ => None,
        }
    }

    /// The command's registered name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Command::Otp { .. } => "otp",
            Command::QuickOtp { .. } => "quick_otp",
            Command::Ping => "ping",
        }
    }
}

/// Reply channel for one invocation.
#[async_trait]
pub trait Reply: Send + Sync {
    /// Sends the initial response. Called exactly once per invocation.
    async fn respond(&self, content: &str) -> Result<()>;

    /// Sends a later message in the same conversation.
    async fn follow_up(&self, content: &str) -> Result<()>;
}

/// User-facing message texts.
pub mod messages {
    use std::time::Duration;

    /// Rejection for a malformed address.
    pub const INVALID_EMAIL: &str = "❌ Please provide a valid email address.";
    /// Reply to `ping`.
    pub const PONG: &str = "✅ Bot is online and responsive!";
    /// Sent between the scan and wait phases of `otp`.
    pub const WAITING: &str = "⏳ No existing OTP found. Waiting for new email...";
    /// Final `otp` failure.
    pub const NOT_FOUND: &str = "❌ No OTP code found.\n\
        **Troubleshooting:**\n\
        • Check if the service sent the email\n\
        • Verify the email address is correct\n\
        • Ensure emails are forwarded to your main inbox\n\
        • Try again in a moment";
    /// Appended when every cycle of a search failed to reach the mailbox.
    pub const UNREACHABLE: &str = "⚠️ The mailbox could not be reached during the search.";
    /// Sent if a search is aborted.
    pub const CANCELLED: &str = "⚠️ The search was interrupted. Please try again.";

    /// Reply to an interaction that is not a known command.
    pub const UNKNOWN_COMMAND: &str = "❌ Unknown command. Try `/otp`, `/quick_otp` or `/ping`.";

    /// Acknowledgment for `otp`, which may search for `total`.
    #[must_use]
    pub fn searching(email: &str, total: Duration) -> String {
        format!(
            "🔍 Searching for OTP codes sent to: `{email}`\n⏰ I'll check for {}...",
            describe(total)
        )
    }

    /// Acknowledgment for `quick_otp`.
    #[must_use]
    pub fn quick_searching(email: &str, budget: Duration) -> String {
        format!(
            "⚡ Quick searching: `{email}`\n⏰ Checking for {}...",
            describe(budget)
        )
    }

    /// Code from the scan phase.
    #[must_use]
    pub fn found(code: &str) -> String {
        format!("✅ OTP code found: `{code}`")
    }

    /// Code from the wait phase.
    #[must_use]
    pub fn found_new(code: &str) -> String {
        format!("✅ New OTP code received: `{code}`")
    }

    /// Final `quick_otp` failure.
    #[must_use]
    pub fn quick_not_found(budget: Duration) -> String {
        format!("❌ No OTP code found within {}.", describe(budget))
    }

    /// Whole minutes where possible, seconds otherwise.
    fn describe(duration: Duration) -> String {
        let secs = duration.as_secs();
        match secs {
            60 => "1 minute".to_string(),
            s if s > 0 && s % 60 == 0 => format!("{} minutes", s / 60),
            1 => "1 second".to_string(),
            s => format!("{s} seconds"),
        }
    }

}

/// Executes commands against an [`OtpSearcher`].
#[derive(Debug, Clone)]
pub struct CommandHandler {
    searcher: Arc<OtpSearcher>,
    search_timeout: Duration,
}

impl CommandHandler {
    /// Creates a handler whose searches each get `search_timeout`.
    #[must_use]
    pub fn new(searcher: Arc<OtpSearcher>, search_timeout: Duration) -> Self {
        Self {
            searcher,
            search_timeout,
        }
    }

    /// Runs one invocation to completion.
    ///
    /// # Errors
    ///
    /// Returns an error only if a reply could not be delivered.
    #[instrument(name = "CommandHandler::handle", skip_all, fields(command = command.name()))]
    pub async fn handle(&self, command: Command, reply: &dyn Reply) -> Result<()> {
        match command {
            Command::Ping => reply.respond(messages::PONG).await,
            Command::Otp { email } => self.otp(&email, reply).await,
            Command::QuickOtp { email } => self.quick_otp(&email, reply).await,
        }
    }

    /// Answers an interaction that did not parse into a [`Command`].
    ///
    /// # Errors
    ///
    /// Returns an error if the reply could not be delivered.
    pub async fn reject_unrecognized(&self, reply: &dyn Reply) -> Result<()> {
        reply.respond(messages::UNKNOWN_COMMAND).await
    }

    async fn otp(&self, email: &str, reply: &dyn Reply) -> Result<()> {
        if validate_target(email).is_err() {
            return reply.respond(messages::INVALID_EMAIL).await;
        }
        reply.respond(&messages::searching(email, self.search_timeout * 2)).await?;

        let existing = self.run(email, SearchMode::ScanExisting).await?;
        if let Some(code) = existing.code() {
            return reply.follow_up(&messages::found(code)).await;
        }
        if existing == SearchOutcome::Cancelled {
            return reply.follow_up(messages::CANCELLED).await;
        }

        reply.follow_up(messages::WAITING).await?;

        let fresh = self.run(email, SearchMode::WaitForNew).await?;
        let text = match &fresh {
            SearchOutcome::Found { code } => messages::found_new(code),
            SearchOutcome::Cancelled => messages::CANCELLED.to_string(),
            SearchOutcome::NotFound { .. } => {
                not_found_text(messages::NOT_FOUND, &[&existing, &fresh])
            }
        };
        reply.follow_up(&text).await
    }

    async fn quick_otp(&self, email: &str, reply: &dyn Reply) -> Result<()> {
        if validate_target(email).is_err() {
            return reply.respond(messages::INVALID_EMAIL).await;
        }
        reply
            .respond(&messages::quick_searching(email, self.search_timeout))
            .await?;

        let outcome = self.run(email, SearchMode::ScanExisting).await?;
        let text = match &outcome {
            SearchOutcome::Found { code } => messages::found(code),
            SearchOutcome::Cancelled => messages::CANCELLED.to_string(),
            SearchOutcome::NotFound { .. } => {
                not_found_text(&messages::quick_not_found(self.search_timeout), &[&outcome])
            }
        };
        reply.follow_up(&text).await
    }

    async fn run(&self, email: &str, mode: SearchMode) -> Result<SearchOutcome> {
        let request = self.searcher.request(email, mode, self.search_timeout)?;
        let outcome = self.searcher.spawn(request).outcome().await;
        info!(mode = ?mode, found = outcome.code().is_some(), "Search phase finished");
        Ok(outcome)
    }
}

fn not_found_text(base: &str, outcomes: &[&SearchOutcome]) -> String {
    if outcomes.iter().all(|o| o.mailbox_unreachable()) {
        format!("{base}\n{}", messages::UNREACHABLE)
    } else {
        base.to_string()
    }
}
