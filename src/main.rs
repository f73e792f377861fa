//! otp-relay bot binary.
//!
//! Reads configuration from the environment (and `.env` if present), then runs
//! the Discord gateway client until it stops.
//!
//! ```bash
//! export DISCORD_BOT_TOKEN="..."
//! export EMAIL_ADDRESS="otp-inbox@example.com"
//! export EMAIL_PASSWORD="app-password"
//! export IMAP_SERVER="imap.example.com"
//! RUST_LOG=otp_relay=debug cargo run
//! ```

use otp_relay::discord::DiscordBot;
use otp_relay::{BotConfig, CommandHandler, Error, ImapMailbox, OtpSearcher};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("otp_relay=info")),
        )
        .with_target(true)
        .init();

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(Error::MissingEnvironment { names }) => {
            eprintln!("❌ Missing environment variables: {}", names.join(", "));
            eprintln!("💡 Please check your .env file and make sure all variables are set.");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let mailbox = Arc::new(ImapMailbox::new(config.imap.clone()));

    info!(
        account = %mailbox.email(),
        imap_host = %config.imap.imap_host,
        mailbox = %config.imap.mailbox,
        search_timeout_secs = config.search_timeout.as_secs(),
        "Starting OTP bot"
    );

    let searcher = Arc::new(OtpSearcher::new(mailbox, config.polling.clone()));
    let handler = Arc::new(CommandHandler::new(searcher, config.search_timeout));

    match DiscordBot::new(handler).run(config.bot_token()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Bot stopped");
            ExitCode::FAILURE
        }
    }
}
