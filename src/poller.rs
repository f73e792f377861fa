//! Bounded polling search for OTP codes.
//!
//! [`OtpSearcher`] repeatedly queries a [`Mailbox`] and runs a [`Matcher`]
//! over each message until a code turns up or the request's deadline passes.
//!
//! ```text
//! Init ─► FetchBatch ─► Evaluate ──found──► Success
//!             ▲             │
//!             │          no match
//!             │             ▼
//!             └── Idle ◄── now < deadline ──otherwise──► Exhausted
//! ```
//!
//! Mailbox faults are contained here: they are logged, counted in
//! [`SearchOutcome::NotFound`], and the loop carries on to the next cycle.
//! A cycle still in flight when the deadline passes is dropped and counted as a
//! fault, so a hung server cannot stretch a search past its budget.
//!
//! # Example
//!
//! ```no_run
//! use otp_relay::{ImapConfig, ImapMailbox, OtpSearcher, PollingConfig, SearchMode, SearchOutcome};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> otp_relay::Result<()> {
//! # let config = ImapConfig::builder().email("a@b.cc").password("x").imap_host("imap.b.cc").build()?;
//! let searcher = Arc::new(OtpSearcher::new(
//!     Arc::new(ImapMailbox::new(config)),
//!     PollingConfig::default(),
//! ));
//! let request = searcher.request("someone@example.com", SearchMode::ScanExisting, Duration::from_secs(60))?;
//!
//! if let SearchOutcome::Found { code } = searcher.spawn(request).outcome().await {
//!     println!("OTP: {code}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::{validate_target, PollingConfig};
use crate::error::Result;
use crate::mailbox::Mailbox;
use crate::matcher::{search_text, Matcher, OtpExtractor};
use chrono::Utc;
use email_address::EmailAddress;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Which messages a search considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// Every message currently in the inbox, regardless of age.
    ScanExisting,
    /// Only messages that arrived within the fresh window.
    WaitForNew,
}

/// One bounded search, owned by the task running it.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Validated recipient address.
    pub target: EmailAddress,
    /// Scan or wait.
    pub mode: SearchMode,
    /// Wall-clock budget for the whole search, including any fetch in flight.
    pub timeout: Duration,
    /// Delay between fetch cycles.
    pub poll_interval: Duration,
}

/// How a search ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A code was extracted.
    Found {
        /// The extracted digits.
        code: String,
    },
    /// The deadline passed without a match.
    NotFound {
        /// Fetch cycles attempted.
        cycles: u32,
        /// Cycles that ended in a mailbox fault.
        faults: u32,
    },
    /// The search task was aborted before finishing.
    Cancelled,
}

impl SearchOutcome {
    /// Returns the code if one was found.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            SearchOutcome::Found { code } => Some(code),
            _ => None,
        }
    }

    /// Returns `true` if the search ran out of time and every cycle failed.
    #[must_use]
    pub fn mailbox_unreachable(&self) -> bool {
        matches!(self, SearchOutcome::NotFound { cycles, faults } if *cycles > 0 && faults == cycles)
    }
}

/// Runs bounded OTP searches against a mailbox.
pub struct OtpSearcher {
    mailbox: Arc<dyn Mailbox>,
    matcher: Arc<dyn Matcher>,
    polling: PollingConfig,
}

impl std::fmt::Debug for OtpSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpSearcher")
            .field("matcher", &self.matcher.description())
            .field("polling", &self.polling)
            .finish_non_exhaustive()
    }
}

impl OtpSearcher {
    /// Creates a searcher using the built-in [`OtpExtractor`] rules.
    #[must_use]
    pub fn new(mailbox: Arc<dyn Mailbox>, polling: PollingConfig) -> Self {
        Self::with_matcher(mailbox, Arc::new(OtpExtractor::new()), polling)
    }

    /// Creates a searcher with a custom matcher.
    #[must_use]
    pub fn with_matcher(
        mailbox: Arc<dyn Mailbox>,
        matcher: Arc<dyn Matcher>,
        polling: PollingConfig,
    ) -> Self {
        Self {
            mailbox,
            matcher,
            polling,
        }
    }

    /// Builds a request using this searcher's poll interval.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidEmailFormat`] if `target` is not a valid address.
    pub fn request(
        &self,
        target: &str,
        mode: SearchMode,
        timeout: Duration,
    ) -> Result<SearchRequest> {
        Ok(SearchRequest {
            target: validate_target(target)?,
            mode,
            timeout,
            poll_interval: self.polling.interval,
        })
    }

    /// Runs the search to completion on the calling task.
    #[instrument(
        name = "OtpSearcher::search",
        skip_all,
        fields(
            target = %request.target,
            mode = ?request.mode,
            timeout_secs = request.timeout.as_secs()
        )
    )]
    pub async fn search(&self, request: &SearchRequest) -> SearchOutcome {
        let deadline = Instant::now() + request.timeout;
        let mut cycles = 0u32;
        let mut faults = 0u32;

        loop {
            cycles += 1;

            // A zero or nearly spent budget still gets one interval to finish its cycle.
            let cycle_deadline = deadline.max(Instant::now() + request.poll_interval);

            match tokio::time::timeout_at(cycle_deadline, self.poll_once(request)).await {
                Ok(Ok(Some(code))) => {
                    info!(cycles, "OTP found");
                    return SearchOutcome::Found { code };
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    faults += 1;
                    warn!(
                        cycle = cycles,
                        error = %e,
                        category = %e.category(),
                        retryable = e.is_retryable(),
                        "Mailbox query failed"
                    );
                }
                Err(_) => {
                    faults += 1;
                    warn!(cycle = cycles, "Mailbox query abandoned at the search deadline");
                }
            }

            if Instant::now() >= deadline {
                info!(cycles, faults, "Search exhausted without a match");
                return SearchOutcome::NotFound { cycles, faults };
            }

            tokio::time::sleep(request.poll_interval).await;
        }
    }

    /// Runs the search as its own task.
    #[must_use]
    pub fn spawn(self: &Arc<Self>, request: SearchRequest) -> SearchHandle {
        let searcher = Arc::clone(self);
        SearchHandle {
            task: tokio::spawn(async move { searcher.search(&request).await }),
        }
    }

    /// One FetchBatch + Evaluate pass.
    async fn poll_once(&self, request: &SearchRequest) -> Result<Option<String>> {
        let limit = match request.mode {
            SearchMode::ScanExisting => self.polling.scan_limit,
            SearchMode::WaitForNew => self.polling.wait_limit,
        };

        let messages = self
            .mailbox
            .fetch_recent(request.target.as_str(), limit)
            .await?;
        let now = Utc::now();

        debug!(message_count = messages.len(), "Evaluating batch");

        for message in &messages {
            if request.mode == SearchMode::WaitForNew
                && !message.is_fresh(self.polling.fresh_window, now)
            {
                debug!(received_at = %message.received_at, "Skipping stale message");
                continue;
            }

            let text = search_text(&message.subject, &message.body);
            if let Some(code) = self.matcher.find_match(&text) {
                debug!(
                    code = %code,
                    matcher = %self.matcher.description(),
                    "Match in message"
                );
                return Ok(Some(code.into_owned()));
            }
        }

        Ok(None)
    }
}

/// Handle to a search running on the tokio scheduler.
#[derive(Debug)]
pub struct SearchHandle {
    task: JoinHandle<SearchOutcome>,
}

impl SearchHandle {
    /// Waits for the search to finish.
    ///
    /// Returns [`SearchOutcome::Cancelled`] if the task was aborted or panicked.
    pub async fn outcome(self) -> SearchOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_panic() {
                    warn!(error = %e, "Search task panicked");
                }
                SearchOutcome::Cancelled
            }
        }
    }

    /// Aborts the search at its next suspension point.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Returns `true` once the search has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
