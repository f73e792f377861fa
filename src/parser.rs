//! Internal module for turning raw IMAP fetches into [`EmailMessage`]s.

use crate::mailbox::EmailMessage;
use async_imap::types::Fetch;
use chrono::{DateTime, Utc};
use mailparse::{parse_mail, MailHeaderMap, ParsedMail};
use tracing::{debug, warn};

/// Parses a fetched message.
///
/// Malformed messages are logged and skipped (`None`) rather than failing the
/// whole fetch cycle.
pub(crate) fn parse_fetch(message: &Fetch) -> Option<EmailMessage> {
    let uid = message.uid;

    let Some(raw) = message.body() else {
        debug!(uid, "Message has no body");
        return None;
    };

    let internal_date = message.internal_date().map(|d| d.with_timezone(&Utc));

    match parse_raw(raw, internal_date) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(uid, error = %e, "Failed to parse email, skipping message");
            None
        }
    }
}

/// Parses RFC 5322 bytes. `fallback_date` is used when the `Date` header is
/// missing or unparseable; without either the message is dated at the epoch.
pub(crate) fn parse_raw(
    raw: &[u8],
    fallback_date: Option<DateTime<Utc>>,
) -> Result<EmailMessage, mailparse::MailParseError> {
    let parsed = parse_mail(raw)?;

    let subject = parsed.headers.get_first_value("Subject").unwrap_or_default();
    let recipient = parsed.headers.get_first_value("To").unwrap_or_default();
    let received_at = parsed
        .headers
        .get_first_value("Date")
        .and_then(|date| mailparse::dateparse(&date).ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .or(fallback_date)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let body = extract_body_text(&parsed)?;

    Ok(EmailMessage {
        subject,
        body,
        received_at,
        recipient,
    })
}

/// Extracts text content from a parsed email, preferring `text/plain` over `text/html`.
fn extract_body_text(parsed: &ParsedMail<'_>) -> Result<String, mailparse::MailParseError> {
    if parsed.subparts.is_empty() {
        return parsed.get_body();
    }

    for wanted in ["text/plain", "text/html"] {
        if let Some(part) = find_part(parsed, wanted) {
            if let Ok(body) = part.get_body() {
                return Ok(body);
            }
        }
    }

    match parsed.subparts.first() {
        Some(first_part) => extract_body_text(first_part),
        None => parsed.get_body(),
    }
}

/// Depth-first search for the first leaf part with the given mimetype.
fn find_part<'p, 'a>(parsed: &'p ParsedMail<'a>, mimetype: &str) -> Option<&'p ParsedMail<'a>> {
    if parsed.subparts.is_empty() {
        return parsed
            .ctype
            .mimetype
            .eq_ignore_ascii_case(mimetype)
            .then_some(parsed);
    }
    parsed
        .subparts
        .iter()
        .find_map(|part| find_part(part, mimetype))
}
