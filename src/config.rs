//! Configuration for the mailbox connection, the poller and the bot process.
//!
//! [`BotConfig::from_env`] is the usual entry point. The pieces can also be
//! built directly:
//!
//! ```
//! use otp_relay::ImapConfig;
//!
//! let config = ImapConfig::builder()
//!     .email("otp-inbox@example.com")
//!     .password("app-password")
//!     .imap_host("imap.example.com")
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.server_address(), "imap.example.com:993");
//! ```

use crate::error::{Error, Result};
use email_address::EmailAddress;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Environment variable holding the chat platform bot token.
pub const ENV_BOT_TOKEN: &str = "DISCORD_BOT_TOKEN";
/// Environment variable holding the mailbox account address.
pub const ENV_EMAIL_ADDRESS: &str = "EMAIL_ADDRESS";
/// Environment variable holding the mailbox account secret.
pub const ENV_EMAIL_PASSWORD: &str = "EMAIL_PASSWORD";
/// Environment variable holding the IMAP server hostname.
pub const ENV_IMAP_SERVER: &str = "IMAP_SERVER";
/// Optional IMAP port override.
pub const ENV_IMAP_PORT: &str = "IMAP_PORT";
/// Optional poll interval override, in seconds.
pub const ENV_POLL_INTERVAL: &str = "OTP_POLL_INTERVAL_SECS";
/// Optional per-phase search timeout override, in seconds.
pub const ENV_SEARCH_TIMEOUT: &str = "OTP_SEARCH_TIMEOUT_SECS";

const REQUIRED_VARS: [&str; 4] = [
    ENV_BOT_TOKEN,
    ENV_EMAIL_ADDRESS,
    ENV_EMAIL_PASSWORD,
    ENV_IMAP_SERVER,
];

/// Configuration for connecting to the IMAP server.
///
/// Create using [`ImapConfig::builder()`]. The password is kept in a
/// [`SecretString`] and never appears in `Debug` output.
#[derive(Clone)]
pub struct ImapConfig {
    email: EmailAddress,
    password: SecretString,
    /// IMAP server hostname.
    pub imap_host: String,
    /// IMAP server port (default: 993 for IMAPS).
    pub imap_port: u16,
    /// Mailbox searched for codes (default: `INBOX`).
    pub mailbox: String,
    /// Per-step timeouts for each fetch cycle.
    pub timeouts: TimeoutConfig,
}

impl std::fmt::Debug for ImapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConfig")
            .field("email", &self.email.as_str())
            .field("password", &"[REDACTED]")
            .field("imap_host", &self.imap_host)
            .field("imap_port", &self.imap_port)
            .field("mailbox", &self.mailbox)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl ImapConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ImapConfigBuilder {
        ImapConfigBuilder::default()
    }

    /// Returns the account address as a string slice.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Returns the account password for authentication.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Returns the full IMAP server address as "host:port".
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.imap_host, self.imap_port)
    }
}

/// Timeouts for the individual IMAP steps of one fetch cycle.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for establishing TCP/TLS connection.
    pub connect: Duration,
    /// Timeout for IMAP authentication.
    pub auth: Duration,
    /// Timeout for selecting a mailbox.
    pub select: Duration,
    /// Timeout for the recipient search.
    pub search: Duration,
    /// Timeout for fetching message content.
    pub message_fetch: Duration,
    /// Timeout for logout operation.
    pub logout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            auth: Duration::from_secs(30),
            select: Duration::from_secs(10),
            search: Duration::from_secs(10),
            message_fetch: Duration::from_secs(30),
            logout: Duration::from_secs(5),
        }
    }
}

/// Polling parameters for bounded searches.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Delay between fetch cycles.
    pub interval: Duration,
    /// Messages older than this are ignored when waiting for new mail.
    pub fresh_window: Duration,
    /// Batch size when scanning existing mail.
    pub scan_limit: usize,
    /// Batch size when waiting for new mail.
    pub wait_limit: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            fresh_window: Duration::from_secs(120),
            scan_limit: 10,
            wait_limit: 5,
        }
    }
}

/// Builder for [`ImapConfig`].
#[derive(Debug, Default)]
pub struct ImapConfigBuilder {
    email: Option<String>,
    password: Option<String>,
    imap_host: Option<String>,
    imap_port: Option<u16>,
    mailbox: Option<String>,
    timeouts: Option<TimeoutConfig>,
}

impl ImapConfigBuilder {
    /// Sets the account address (required).
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the password (required). For Gmail/Outlook, use an app-specific password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the IMAP server hostname (required).
    #[must_use]
    pub fn imap_host(mut self, host: impl Into<String>) -> Self {
        self.imap_host = Some(host.into());
        self
    }

    /// Sets the IMAP server port. Default is 993.
    #[must_use]
    pub fn imap_port(mut self, port: u16) -> Self {
        self.imap_port = Some(port);
        self
    }

    /// Sets the mailbox to search. Default is `INBOX`.
    #[must_use]
    pub fn mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.mailbox = Some(mailbox.into());
        self
    }

    /// Sets timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or invalid.
    pub fn build(self) -> Result<ImapConfig> {
        let email_raw = self.email.ok_or_else(|| Error::InvalidConfig {
            message: "email is required".into(),
        })?;
        let email = EmailAddress::parse_with_options(&email_raw, email_address::Options::default())
            .map_err(|_| Error::InvalidEmailFormat { email: email_raw })?;

        let password_raw = self.password.ok_or_else(|| Error::InvalidConfig {
            message: "password is required".into(),
        })?;

        let imap_host = self
            .imap_host
            .filter(|host| !host.trim().is_empty())
            .ok_or_else(|| Error::InvalidConfig {
                message: "imap_host is required".into(),
            })?;

        Ok(ImapConfig {
            email,
            password: SecretString::from(password_raw),
            imap_host,
            imap_port: self.imap_port.unwrap_or(993),
            mailbox: self.mailbox.unwrap_or_else(|| "INBOX".to_string()),
            timeouts: self.timeouts.unwrap_or_default(),
        })
    }
}

/// Validates a target address supplied by a user.
///
/// Accepts a bare `local@domain.tld` address: no display name, no domain
/// literal, and an alphabetic top-level domain of at least two characters.
///
/// # Errors
///
/// Returns [`Error::InvalidEmailFormat`] if the address is rejected.
///
/// # Example
///
/// ```
/// use otp_relay::config::validate_target;
///
/// assert!(validate_target("someone@example.com").is_ok());
/// assert!(validate_target("someone@localhost").is_err());
/// assert!(validate_target("Someone <someone@example.com>").is_err());
/// ```
pub fn validate_target(email: &str) -> Result<EmailAddress> {
    let invalid = || Error::InvalidEmailFormat {
        email: email.to_string(),
    };

    let parsed = EmailAddress::parse_with_options(email, email_address::Options::default())
        .map_err(|_| invalid())?;

    if parsed.email() != email {
        return Err(invalid());
    }

    let domain = parsed.domain();
    let tld_ok = domain
        .rsplit_once('.')
        .is_some_and(|(head, tld)| {
            !head.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
        });
    if !tld_ok || domain.starts_with('[') {
        return Err(invalid());
    }

    Ok(parsed)
}

/// Everything the bot process needs at startup.
#[derive(Clone)]
pub struct BotConfig {
    bot_token: SecretString,
    /// Mailbox connection settings.
    pub imap: ImapConfig,
    /// Poller settings.
    pub polling: PollingConfig,
    /// Budget for each search phase of a command.
    pub search_timeout: Duration,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_token", &"[REDACTED]")
            .field("imap", &self.imap)
            .field("polling", &self.polling)
            .field("search_timeout", &self.search_timeout)
            .finish()
    }
}

impl BotConfig {
    /// Default budget for each search phase.
    pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(60);

    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEnvironment`] naming every unset or empty
    /// required variable, or [`Error::InvalidConfig`] for unparseable values.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let missing: Vec<&'static str> = REQUIRED_VARS
            .into_iter()
            .filter(|name| get(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingEnvironment { names: missing });
        }

        let required = |name: &'static str| {
            get(name).ok_or(Error::MissingEnvironment { names: vec![name] })
        };

        let mut imap = ImapConfig::builder()
            .email(required(ENV_EMAIL_ADDRESS)?)
            .password(required(ENV_EMAIL_PASSWORD)?)
            .imap_host(required(ENV_IMAP_SERVER)?);
        if let Some(port) = parse_optional::<u16>(ENV_IMAP_PORT, get(ENV_IMAP_PORT))? {
            imap = imap.imap_port(port);
        }

        let mut polling = PollingConfig::default();
        if let Some(secs) = parse_optional::<u64>(ENV_POLL_INTERVAL, get(ENV_POLL_INTERVAL))? {
            if secs == 0 {
                return Err(Error::InvalidConfig {
                    message: format!("{ENV_POLL_INTERVAL} must be at least 1 second"),
                });
            }
            polling.interval = Duration::from_secs(secs);
        }

        let search_timeout = parse_optional::<u64>(ENV_SEARCH_TIMEOUT, get(ENV_SEARCH_TIMEOUT))?
            .map_or(Self::DEFAULT_SEARCH_TIMEOUT, Duration::from_secs);

        Ok(Self {
            bot_token: SecretString::from(required(ENV_BOT_TOKEN)?),
            imap: imap.build()?,
            polling,
            search_timeout,
        })
    }

    /// Returns the chat platform bot token.
    #[must_use]
    pub fn bot_token(&self) -> &str {
        self.bot_token.expose_secret()
    }
}

fn parse_optional<T: std::str::FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>> {
    raw.map(|value| {
        value.trim().parse::<T>().map_err(|_| Error::InvalidConfig {
            message: format!("{name} has an invalid value: {value}"),
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_BOT_TOKEN, "bot-token"),
            (ENV_EMAIL_ADDRESS, "inbox@example.com"),
            (ENV_EMAIL_PASSWORD, "secret"),
            (ENV_IMAP_SERVER, "imap.example.com"),
        ]
    }

    #[test]
    fn test_builder_minimal() {
        let config = ImapConfig::builder()
            .email("user@example.com")
            .password("secret")
            .imap_host("mail.example.com")
            .build()
            .unwrap();

        assert_eq!(config.email(), "user@example.com");
        assert_eq!(config.password(), "secret");
        assert_eq!(config.imap_port, 993);
        assert_eq!(config.mailbox, "INBOX");
        assert_eq!(config.server_address(), "mail.example.com:993");
    }

    #[test]
    fn test_builder_missing_fields() {
        assert!(ImapConfig::builder().password("secret").build().is_err());
        assert!(ImapConfig::builder()
            .email("user@example.com")
            .imap_host("mail.example.com")
            .build()
            .is_err());
        assert!(ImapConfig::builder()
            .email("user@example.com")
            .password("secret")
            .build()
            .is_err());
    }

    #[test]
    fn test_builder_invalid_email() {
        let result = ImapConfig::builder()
            .email("invalid-email")
            .password("secret")
            .imap_host("mail.example.com")
            .build();
        assert!(matches!(result, Err(Error::InvalidEmailFormat { .. })));
    }

    #[test]
    fn test_password_not_in_debug() {
        let config = ImapConfig::builder()
            .email("user@example.com")
            .password("super-secret-password")
            .imap_host("mail.example.com")
            .build()
            .unwrap();

        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("super-secret-password"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_validate_target() {
        assert!(validate_target("first.last+tag@sub.example.co").is_ok());
        assert!(validate_target("not-an-email").is_err());
        assert!(validate_target("user@localhost").is_err());
        assert!(validate_target("user@example.c").is_err());
        assert!(validate_target("user@example.123").is_err());
        assert!(validate_target("user@[127.0.0.1]").is_err());
        assert!(validate_target("User <user@example.com>").is_err());
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = BotConfig::from_lookup(env(&full_env())).unwrap();
        assert_eq!(config.bot_token(), "bot-token");
        assert_eq!(config.imap.imap_host, "imap.example.com");
        assert_eq!(config.imap.imap_port, 993);
        assert_eq!(config.polling.interval, Duration::from_secs(5));
        assert_eq!(config.polling.fresh_window, Duration::from_secs(120));
        assert_eq!(config.polling.scan_limit, 10);
        assert_eq!(config.polling.wait_limit, 5);
        assert_eq!(config.search_timeout, Duration::from_secs(60));
        assert!(!format!("{config:?}").contains("bot-token"));
    }

    #[test]
    fn test_from_lookup_reports_all_missing() {
        let result = BotConfig::from_lookup(env(&[
            (ENV_EMAIL_ADDRESS, "inbox@example.com"),
            (ENV_EMAIL_PASSWORD, "  "),
        ]));
        match result {
            Err(Error::MissingEnvironment { names }) => {
                assert_eq!(names, vec![ENV_BOT_TOKEN, ENV_EMAIL_PASSWORD, ENV_IMAP_SERVER]);
            }
            other => panic!("expected missing environment, got {other:?}"),
        }
    }

    #[test]
    fn test_from_lookup_overrides() {
        let mut vars = full_env();
        vars.push((ENV_IMAP_PORT, "1993"));
        vars.push((ENV_POLL_INTERVAL, "2"));
        vars.push((ENV_SEARCH_TIMEOUT, "90"));

        let config = BotConfig::from_lookup(env(&vars)).unwrap();
        assert_eq!(config.imap.imap_port, 1993);
        assert_eq!(config.polling.interval, Duration::from_secs(2));
        assert_eq!(config.search_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_from_lookup_rejects_zero_poll_interval() {
        let mut vars = full_env();
        vars.push((ENV_POLL_INTERVAL, "0"));

        let result = BotConfig::from_lookup(env(&vars));
        match result {
            Err(Error::InvalidConfig { message }) => assert!(message.contains(ENV_POLL_INTERVAL)),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn test_from_lookup_invalid_port() {
        let mut vars = full_env();
        vars.push((ENV_IMAP_PORT, "imaps"));

        let result = BotConfig::from_lookup(env(&vars));
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }
}
