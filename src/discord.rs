//! Discord gateway adapter.
//!
//! Registers [`COMMANDS`] as global slash commands once the gateway session is
//! ready, and routes each command interaction to the [`CommandHandler`]. Serenity
//! dispatches every event on its own task, so long-running searches for
//! different users proceed concurrently.

use crate::commands::{
    Command, CommandHandler, Reply, COMMANDS, EMAIL_OPTION, EMAIL_OPTION_DESCRIPTION,
};
use crate::error::Result;
use async_trait::async_trait;
use serenity::all::{
    Command as SlashCommand, CommandInteraction, CommandOptionType, Context, CreateCommand,
    CreateCommandOption, CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, EventHandler, GatewayIntents, Http, Interaction, Ready,
};
use serenity::Client;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Serenity event handler owning the command layer.
#[derive(Debug)]
pub struct DiscordBot {
    handler: Arc<CommandHandler>,
}

impl DiscordBot {
    /// Wraps a command handler.
    #[must_use]
    pub fn new(handler: Arc<CommandHandler>) -> Self {
        Self { handler }
    }

    /// Connects to the gateway and runs until the client shuts down.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or the gateway connection fails.
    pub async fn run(self, token: &str) -> Result<()> {
        let mut client = Client::builder(token, GatewayIntents::non_privileged())
            .event_handler(self)
            .await?;

        client.start().await?;
        Ok(())
    }
}

/// Slash command definitions derived from [`COMMANDS`].
fn slash_commands() -> Vec<CreateCommand> {
    COMMANDS
        .iter()
        .map(|spec| {
            let command = CreateCommand::new(spec.name).description(spec.description);
            if spec.takes_email {
                command.add_option(
                    CreateCommandOption::new(
                        CommandOptionType::String,
                        EMAIL_OPTION,
                        EMAIL_OPTION_DESCRIPTION,
                    )
                    .required(true),
                )
            } else {
                command
            }
        })
        .collect()
}

fn parse_interaction(interaction: &CommandInteraction) -> Option<Command> {
    let email = interaction
        .data
        .options
        .iter()
        .find(|option| option.name == EMAIL_OPTION)
        .and_then(|option| option.value.as_str());

    Command::parse(&interaction.data.name, email)
}

#[async_trait]
impl EventHandler for DiscordBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, user_id = %ready.user.id, "Logged in");

        match SlashCommand::set_global_commands(&ctx.http, slash_commands()).await {
            Ok(registered) => info!(count = registered.len(), "Slash commands synced"),
            Err(e) => error!(error = %e, "Failed to register slash commands"),
        }
    }

    #[instrument(name = "DiscordBot::interaction_create", skip_all)]
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };

        let reply = DiscordReply {
            http: Arc::clone(&ctx.http),
            interaction: &command,
        };

        let result = match parse_interaction(&command) {
            Some(parsed) => {
                info!(command = parsed.name(), user_id = %command.user.id, "Command received");
                self.handler.handle(parsed, &reply).await
            }
            None => {
                warn!(command_name = %command.data.name, "Unknown or malformed command");
                self.handler.reject_unrecognized(&reply).await
            }
        };

        if let Err(e) = result {
            error!(error = %e, category = %e.category(), "Failed to reply to command");
        }
    }
}

/// Ephemeral replies to one slash command interaction.
struct DiscordReply<'a> {
    http: Arc<Http>,
    interaction: &'a CommandInteraction,
}

#[async_trait]
impl<'a> Reply for DiscordReply<'a> {
    async fn respond(&self, content: &str) -> Result<()> {
        let message = CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true);
        self.interaction
            .create_response(&self.http, CreateInteractionResponse::Message(message))
            .await?;
        Ok(())
    }

    async fn follow_up(&self, content: &str) -> Result<()> {
        let followup = CreateInteractionResponseFollowup::new()
            .content(content)
            .ephemeral(true);
        self.interaction
            .create_followup(&self.http, followup)
            .await?;
        Ok(())
    }
}
