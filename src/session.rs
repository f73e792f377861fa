//! Internal IMAP session operations.
//!
//! Thin wrappers over async-imap that attach context to errors. Nothing here
//! writes to the mailbox: searches are read-only and fetches use `BODY.PEEK[]`
//! so the server leaves `\Seen` untouched.

use crate::connection::TlsStream;
use crate::error::{Error, Result};
use async_imap::types::Fetch;
use async_imap::Session;
use futures::TryStreamExt;
use tracing::{debug, instrument};

/// Type alias for IMAP session over TLS.
pub(crate) type ImapSession = Session<TlsStream>;

/// Data items requested for each message.
const FETCH_QUERY: &str = "(UID INTERNALDATE BODY.PEEK[])";

/// Authenticates to the IMAP server and returns a session.
#[instrument(name = "session::authenticate", skip_all, fields(email = %email))]
pub(crate) async fn authenticate(
    tls_stream: TlsStream,
    email: &str,
    password: &str,
) -> Result<ImapSession> {
    let client = async_imap::Client::new(tls_stream);

    debug!("Authenticating to IMAP server");

    client
        .login(email, password)
        .await
        .map_err(|(source, _client)| Error::ImapLogin {
            email: email.to_string(),
            source,
        })
}

/// Selects a mailbox (typically "INBOX").
#[instrument(name = "session::select", skip(session), fields(mailbox = %mailbox))]
pub(crate) async fn select_mailbox(session: &mut ImapSession, mailbox: &str) -> Result<()> {
    session
        .select(mailbox)
        .await
        .map_err(|source| Error::SelectMailbox {
            mailbox: mailbox.to_string(),
            source,
        })?;

    Ok(())
}

/// Returns the UIDs of every message addressed to `recipient`, ascending.
#[instrument(name = "session::search_recipient", skip(session), fields(recipient = %recipient))]
pub(crate) async fn search_recipient(
    session: &mut ImapSession,
    recipient: &str,
) -> Result<Vec<u32>> {
    let query = format!("TO {}", quote(recipient));

    let uids = session
        .uid_search(&query)
        .await
        .map_err(|source| Error::ImapSearch {
            recipient: recipient.to_string(),
            source,
        })?;

    let mut uids: Vec<u32> = uids.into_iter().collect();
    uids.sort_unstable();

    debug!(uid_count = uids.len(), "Found messages for recipient");

    Ok(uids)
}

/// Fetches full messages for a UID set without marking them read.
#[instrument(name = "session::fetch", skip(session), fields(uid_set = %uid_set))]
pub(crate) async fn fetch_messages(session: &mut ImapSession, uid_set: &str) -> Result<Vec<Fetch>> {
    let stream = session
        .uid_fetch(uid_set, FETCH_QUERY)
        .await
        .map_err(|source| Error::ImapFetch {
            uid_set: uid_set.to_string(),
            source,
        })?;

    let messages: Vec<Fetch> = stream
        .try_collect()
        .await
        .map_err(|source| Error::FetchMessage { source })?;

    debug!(message_count = messages.len(), "Fetched messages");

    Ok(messages)
}

/// Logs out from IMAP session.
#[instrument(name = "session::logout", skip(session))]
pub(crate) async fn logout(session: &mut ImapSession) -> Result<()> {
    session
        .logout()
        .await
        .map_err(|source| Error::ImapLogout { source })
}

/// Renders `value` as an IMAP quoted string.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Builds the UID set for the newest `limit` UIDs of an ascending list.
pub(crate) fn newest_uid_set(uids: &[u32], limit: usize) -> Option<String> {
    let start = uids.len().saturating_sub(limit);
    let newest = &uids[start..];
    if newest.is_empty() {
        return None;
    }
    Some(
        newest
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(","),
    )
}
