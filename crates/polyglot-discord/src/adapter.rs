use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use serenity::gateway::ShardManager;
use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use polyglot_agent::Relay;
use polyglot_core::config::DiscordConfig;

use crate::error::DiscordError;
use crate::handler::DiscordHandler;

/// Discord channel adapter.
///
/// Wraps a serenity `Client` and drives the event loop until the process
/// exits, rebuilding the client whenever the gateway drops.
pub struct DiscordAdapter {
    relay: Arc<Relay>,
    config: DiscordConfig,
    tasks: TaskTracker,
    /// Shard manager of the current client, for gateway latency.
    shards: Arc<Mutex<Option<Arc<ShardManager>>>>,
}

impl DiscordAdapter {
    pub fn new(config: &DiscordConfig, relay: Arc<Relay>) -> Result<Self, DiscordError> {
        if config.bot_token.trim().is_empty() {
            return Err(DiscordError::NoToken);
        }
        Ok(Self {
            relay,
            config: config.clone(),
            tasks: TaskTracker::new(),
            shards: Arc::new(Mutex::new(None)),
        })
    }

    /// Tracker of in-flight dispatches. Close it and wait on it at shutdown.
    pub fn tasks(&self) -> TaskTracker {
        self.tasks.clone()
    }

    fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::GUILD_MESSAGE_REACTIONS
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::DIRECT_MESSAGE_REACTIONS
            | GatewayIntents::MESSAGE_CONTENT
    }

    /// Connect and keep reconnecting. Never returns; stop it by dropping the
    /// future (the binary races it against ctrl-c).
    pub async fn run(self) {
        let intents = Self::intents();

        loop {
            let mut client = loop {
                match self.build_client(intents).await {
                    Ok(c) => break c,
                    Err(e) => {
                        error!("Discord: connect failed ({e}), retrying in 30s");
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                }
            };

            info!("Discord: gateway connecting");
            if let Err(e) = client.start().await {
                warn!("Discord: gateway error ({e}), reconnecting in 5s");
            } else {
                info!("Discord: gateway stopped cleanly, reconnecting in 5s");
            }

            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    }

    async fn build_client(&self, intents: GatewayIntents) -> Result<Client, serenity::Error> {
        let handler = DiscordHandler {
            relay: Arc::clone(&self.relay),
            config: self.config.clone(),
            bot_id: OnceLock::new(),
            tasks: self.tasks.clone(),
            shards: Arc::clone(&self.shards),
        };

        let client = Client::builder(&self.config.bot_token, intents)
            .event_handler(handler)
            .await?;
        if let Ok(mut shards) = self.shards.lock() {
            *shards = Some(Arc::clone(&client.shard_manager));
        }
        Ok(client)
    }
}
