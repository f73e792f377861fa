//! Integration tests for otp-relay.
//!
//! The live tests require a real IMAP server and are disabled by default.
//! To run them:
//!
//! ```bash
//! # Set environment variables (or put them in .env)
//! export EMAIL_ADDRESS="otp-inbox@example.com"
//! export EMAIL_PASSWORD="your-app-password"
//! export IMAP_SERVER="imap.example.com"
//!
//! # Optional: the recipient to search for (defaults to EMAIL_ADDRESS)
//! export OTP_RELAY_TEST_TARGET="someone@example.com"
//!
//! cargo test --features integration-tests -- --ignored
//! ```

use otp_relay::{
    BotConfig, Error, ImapConfig, ImapMailbox, Mailbox, OtpSearcher, PollingConfig, SearchMode,
    SearchOutcome,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Test Configuration Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn get_test_config() -> Option<ImapConfig> {
    dotenvy::dotenv().ok();
    let email = env::var("EMAIL_ADDRESS").ok()?;
    let password = env::var("EMAIL_PASSWORD").ok()?;
    let host = env::var("IMAP_SERVER").ok()?;

    ImapConfig::builder()
        .email(email)
        .password(password)
        .imap_host(host)
        .build()
        .ok()
}

fn get_test_target(config: &ImapConfig) -> String {
    env::var("OTP_RELAY_TEST_TARGET").unwrap_or_else(|_| config.email().to_string())
}

fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
    move |name| {
        pairs
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| (*value).to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Live Mailbox Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires real IMAP server"]
async fn test_fetch_recent_respects_limit() {
    let config = get_test_config().expect("Test config from environment variables");
    let target = get_test_target(&config);
    let mailbox = ImapMailbox::new(config);

    let messages = mailbox
        .fetch_recent(&target, 3)
        .await
        .expect("Failed to query mailbox");

    assert!(messages.len() <= 3);
}

#[tokio::test]
#[ignore = "requires real IMAP server"]
async fn test_fetch_unknown_recipient_is_empty() {
    let config = get_test_config().expect("Test config from environment variables");
    let mailbox = ImapMailbox::new(config);

    let messages = mailbox
        .fetch_recent("nobody-7f3a91@example.invalid", 10)
        .await
        .expect("Failed to query mailbox");

    assert!(messages.is_empty());
}

#[tokio::test]
#[ignore = "requires real IMAP server"]
async fn test_scan_existing_against_live_inbox() {
    let config = get_test_config().expect("Test config from environment variables");
    let target = get_test_target(&config);
    let searcher = Arc::new(OtpSearcher::new(
        Arc::new(ImapMailbox::new(config)),
        PollingConfig::default(),
    ));

    let request = searcher
        .request(&target, SearchMode::ScanExisting, Duration::ZERO)
        .expect("valid target");

    // Result depends on what the inbox holds
    match searcher.search(&request).await {
        SearchOutcome::Found { code } => {
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
        SearchOutcome::NotFound { cycles, faults } => {
            assert_eq!(cycles, 1);
            assert_eq!(faults, 0, "mailbox should be reachable");
        }
        SearchOutcome::Cancelled => panic!("search was not cancelled"),
    }
}

#[tokio::test]
#[ignore = "requires intentionally wrong credentials"]
async fn test_invalid_credentials() {
    dotenvy::dotenv().ok();
    let host = env::var("IMAP_SERVER").expect("IMAP_SERVER");
    let config = ImapConfig::builder()
        .email("nobody@example.com")
        .password("wrong-password")
        .imap_host(host)
        .build()
        .expect("valid config structure");

    let result = ImapMailbox::new(config)
        .fetch_recent("someone@example.com", 1)
        .await;

    let err = result.expect_err("login should fail");
    assert!(err.is_mailbox_fault());
    println!("Category: {}", err.category());
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_invalid_email_format() {
    let result = ImapConfig::builder()
        .email("not-an-email")
        .password("password")
        .imap_host("imap.example.com")
        .build();

    assert!(matches!(result, Err(Error::InvalidEmailFormat { .. })));
}

#[test]
fn test_missing_required_fields() {
    let result = ImapConfig::builder()
        .password("password")
        .imap_host("imap.example.com")
        .build();
    assert!(result.is_err());

    let result = ImapConfig::builder()
        .email("test@example.com")
        .imap_host("imap.example.com")
        .build();
    assert!(result.is_err());

    let result = ImapConfig::builder()
        .email("test@example.com")
        .password("password")
        .build();
    assert!(result.is_err());
}

#[test]
fn test_bot_config_reports_every_missing_variable() {
    let err = BotConfig::from_lookup(lookup(&[("EMAIL_ADDRESS", "otp@example.com")])).unwrap_err();

    match err {
        Error::MissingEnvironment { names } => {
            assert_eq!(
                names,
                vec!["DISCORD_BOT_TOKEN", "EMAIL_PASSWORD", "IMAP_SERVER"]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_bot_config_applies_defaults() {
    let config = BotConfig::from_lookup(lookup(&[
        ("DISCORD_BOT_TOKEN", "bot-token-value"),
        ("EMAIL_ADDRESS", "otp@example.com"),
        ("EMAIL_PASSWORD", "secret"),
        ("IMAP_SERVER", "imap.example.com"),
    ]))
    .unwrap();

    assert_eq!(config.imap.imap_port, 993);
    assert_eq!(config.polling.interval, Duration::from_secs(5));
    assert_eq!(config.search_timeout, Duration::from_secs(60));

    let debug = format!("{config:?}");
    assert!(!debug.contains("secret"));
    assert!(!debug.contains("bot-token-value"));
}
