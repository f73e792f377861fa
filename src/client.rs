//! IMAP implementation of the [`Mailbox`] seam.
//!
//! Every call to [`ImapMailbox::fetch_recent`] is one complete, scoped IMAP
//! conversation: connect, log in, select, search, fetch, log out. The session
//! never outlives the call, so the poller holds no connection while it sleeps.
//!
//! # Example
//!
//! ```no_run
//! use otp_relay::{ImapConfig, ImapMailbox, Mailbox};
//!
//! # async fn example() -> otp_relay::Result<()> {
//! let config = ImapConfig::builder()
//!     .email("otp-inbox@example.com")
//!     .password("app-password")
//!     .imap_host("imap.example.com")
//!     .build()?;
//!
//! let mailbox = ImapMailbox::new(config);
//! for message in mailbox.fetch_recent("someone@example.com", 10).await? {
//!     println!("{}: {}", message.received_at, message.subject);
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::ImapConfig;
use crate::connection;
use crate::error::{Error, Result};
use crate::mailbox::{EmailMessage, Mailbox};
use crate::parser;
use crate::session::{self, ImapSession};
use async_trait::async_trait;
use std::cmp::Reverse;
use tracing::{debug, instrument, warn};

/// Read-only IMAP mailbox client.
#[derive(Debug, Clone)]
pub struct ImapMailbox {
    config: ImapConfig,
}

impl ImapMailbox {
    /// Creates a client for the configured account. No connection is opened yet.
    #[must_use]
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }

    /// Returns the account address used for login.
    #[must_use]
    pub fn email(&self) -> &str {
        self.config.email()
    }

    /// Connects, authenticates and selects the configured mailbox.
    async fn open_session(&self) -> Result<ImapSession> {
        let config = &self.config;
        let target_addr = config.server_address();
        let timeouts = &config.timeouts;

        let tls_stream = tokio::time::timeout(
            timeouts.connect,
            connection::establish_tls_connection(&config.imap_host, &target_addr),
        )
        .await
        .map_err(|_| Error::ConnectTimeout {
            target: target_addr.clone(),
            timeout: timeouts.connect,
        })??;

        let mut session = tokio::time::timeout(
            timeouts.auth,
            session::authenticate(tls_stream, config.email(), config.password()),
        )
        .await
        .map_err(|_| Error::AuthTimeout {
            email: config.email().to_string(),
            timeout: timeouts.auth,
        })??;

        let selected = tokio::time::timeout(
            timeouts.select,
            session::select_mailbox(&mut session, &config.mailbox),
        )
        .await
        .map_err(|_| Error::SelectTimeout {
            mailbox: config.mailbox.clone(),
            timeout: timeouts.select,
        })
        .and_then(|result| result);

        if let Err(e) = selected {
            self.close(&mut session).await;
            return Err(e);
        }

        debug!(mailbox = %config.mailbox, "Session ready");
        Ok(session)
    }

    /// Runs the recipient query on an open session.
    async fn query(
        &self,
        session: &mut ImapSession,
        recipient: &str,
        limit: usize,
    ) -> Result<Vec<EmailMessage>> {
        let timeouts = &self.config.timeouts;

        let uids = tokio::time::timeout(
            timeouts.search,
            session::search_recipient(session, recipient),
        )
        .await
        .map_err(|_| Error::SearchTimeout {
            recipient: recipient.to_string(),
            timeout: timeouts.search,
        })??;

        let Some(uid_set) = session::newest_uid_set(&uids, limit) else {
            return Ok(Vec::new());
        };

        let fetches = tokio::time::timeout(
            timeouts.message_fetch,
            session::fetch_messages(session, &uid_set),
        )
        .await
        .map_err(|_| Error::FetchTimeout {
            uid_set: uid_set.clone(),
            timeout: timeouts.message_fetch,
        })??;

        let mut parsed: Vec<(u32, EmailMessage)> = fetches
            .iter()
            .filter_map(|fetch| {
                parser::parse_fetch(fetch).map(|message| (fetch.uid.unwrap_or(0), message))
            })
            .collect();
        parsed.sort_by_key(|(uid, _)| Reverse(*uid));

        Ok(parsed.into_iter().map(|(_, message)| message).collect())
    }

    /// Logs out, logging rather than returning any failure.
    async fn close(&self, session: &mut ImapSession) {
        let timeout = self.config.timeouts.logout;
        match tokio::time::timeout(timeout, session::logout(session)).await {
            Ok(Ok(())) => debug!("Logged out"),
            Ok(Err(e)) => warn!(error = %e, "IMAP logout failed"),
            Err(_) => warn!(
                error = %Error::LogoutTimeout { timeout },
                "IMAP logout timed out"
            ),
        }
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    #[instrument(
        name = "ImapMailbox::fetch_recent",
        skip(self),
        fields(imap_host = %self.config.imap_host)
    )]
    async fn fetch_recent(&self, recipient: &str, limit: usize) -> Result<Vec<EmailMessage>> {
        let mut session = self.open_session().await?;
        let result = self.query(&mut session, recipient, limit).await;
        self.close(&mut session).await;

        if let Ok(messages) = &result {
            debug!(message_count = messages.len(), "Fetched recent messages");
        }
        result
    }
}
