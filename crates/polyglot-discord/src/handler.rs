use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use serenity::async_trait;
use serenity::gateway::ShardManager;
use serenity::http::Http;
use serenity::model::channel::{Message, Reaction};
use serenity::model::gateway::Ready;
use serenity::model::id::{ChannelId, MessageId, ShardId, UserId};
use serenity::prelude::{Context, EventHandler};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use polyglot_agent::{Relay, RelayError, RelayOutcome};
use polyglot_core::config::DiscordConfig;
use polyglot_core::types::{MessageId as RelayMessageId, ReactionAdded, ScopeId};

use crate::convert;
use crate::embed;
use crate::send;

/// Serenity event handler wired to the relay.
pub struct DiscordHandler {
    pub relay: Arc<Relay>,
    pub config: DiscordConfig,
    pub bot_id: OnceLock<UserId>,
    /// Dispatches run here so shutdown can wait for them.
    pub tasks: TaskTracker,
    pub shards: Arc<Mutex<Option<Arc<ShardManager>>>>,
}

/// A text command addressed to the bot.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Ping,
    Stats,
    Translate(&'a str),
}

/// Parse `content` as a prefixed command. Unknown commands yield `None`.
pub fn parse_command<'a>(content: &'a str, prefix: &str) -> Option<Command<'a>> {
    let rest = content.trim().strip_prefix(prefix)?;
    let (name, args) = match rest.find(char::is_whitespace) {
        Some(i) => (&rest[..i], rest[i..].trim()),
        None => (rest, ""),
    };
    match name.to_lowercase().as_str() {
        "ping" => Some(Command::Ping),
        "stats" => Some(Command::Stats),
        "translate" => Some(Command::Translate(args)),
        _ => None,
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.bot_id.set(ready.user.id).ok();
        info!(
            name = %ready.user.name,
            guilds = ready.guilds.len(),
            triggers = self.relay.triggers().len(),
            "Discord bot connected"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if !self.accepts(&msg) {
            return;
        }

        let scope = convert::scope_of(&msg);
        if !self.relay.scope_allowed(&scope) {
            return;
        }

        // Commands are stored like any other message, then excluded from their own context.
        // Attachment-only messages are stored with an empty body.
        if let Err(e) = self.relay.handle_message(&convert::to_message(&msg)) {
            warn!(error = %e, message_id = %msg.id, "failed to store message");
        }

        let Some(command) = parse_command(&msg.content, &self.config.command_prefix) else {
            return;
        };

        match command {
            Command::Ping => {
                let latency = self.gateway_latency(ctx.shard_id).await;
                let text = format!("🏓 Pong! Latency: {}", embed::format_latency(latency));
                let sent = send::send_response(&ctx.http, msg.channel_id, &text, Some(msg.id)).await;
                if let Err(e) = sent {
                    warn!(error = %e, "ping reply failed");
                }
            }
            Command::Stats => {
                let latency = self.gateway_latency(ctx.shard_id).await;
                let triggers = self.relay.triggers().emoji();
                let view = embed::stats_view(ctx.cache.guild_count(), latency, &triggers);
                let sent =
                    send::send_embed(&ctx.http, msg.channel_id, view.to_create_embed(), Some(msg.id)).await;
                if let Err(e) = sent {
                    warn!(error = %e, "stats reply failed");
                }
            }
            Command::Translate("") => {
                let usage = format!("Usage: `{}translate <text>`", self.config.command_prefix);
                let _ = send::send_response(&ctx.http, msg.channel_id, &usage, Some(msg.id)).await;
            }
            Command::Translate(text) => {
                let relay = Arc::clone(&self.relay);
                let http = Arc::clone(&ctx.http);
                let text = text.to_string();
                let requester = convert::author_name(&msg);
                let before = convert::message_time(msg.id);
                let (channel_id, reply_to) = (msg.channel_id, msg.id);
                let _ = channel_id.broadcast_typing(&ctx.http).await;

                self.tasks.spawn(async move {
                    let exclude = RelayMessageId(reply_to.to_string());
                    let result = relay
                        .translate_text(&scope, &text, before, Some(&exclude))
                        .await;
                    present(&http, channel_id, reply_to, result, Some(&requester)).await;
                });
            }
        }
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        let Some(user_id) = reaction.user_id else {
            return;
        };
        if self.bot_id.get() == Some(&user_id) {
            return;
        }
        let Some(emoji) = convert::emoji_key(&reaction.emoji) else {
            return;
        };
        if !self.relay.is_trigger(&emoji) {
            return;
        }

        let scope = ScopeId(reaction.channel_id.to_string());
        if !self.relay.scope_allowed(&scope) {
            return;
        }

        // Messages sent before the bot started are fetched and stored first.
        let message_id = RelayMessageId(reaction.message_id.to_string());
        match self.relay.store().get(&message_id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                if !self.backfill(&ctx, reaction.channel_id, reaction.message_id).await {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, message_id = %message_id, "message lookup failed");
                return;
            }
        }

        let requester = match reaction.user(&ctx).await {
            Ok(u) => Some(convert::display_name(None, u.global_name.as_deref(), &u.name)),
            Err(_) => None,
        };

        info!(
            message_id = %message_id,
            user_id = %user_id,
            emoji = %emoji,
            "trigger reaction received"
        );

        let event = ReactionAdded {
            scope_id: scope,
            message_id,
            emoji,
            actor_id: user_id.to_string().into(),
        };
        let relay = Arc::clone(&self.relay);
        let http = Arc::clone(&ctx.http);
        let channel_id = reaction.channel_id;
        let reply_to = reaction.message_id;
        let _ = channel_id.broadcast_typing(&ctx.http).await;

        self.tasks.spawn(async move {
            let result = relay.handle_reaction(&event).await;
            present(&http, channel_id, reply_to, result, requester.as_deref()).await;
        });
    }
}

/// Whether a message from this author is stored and answered: never the bot
/// itself, and other bots only when `ignore_bots` is off.
pub fn accepts_author(
    bot_id: Option<&UserId>,
    author: UserId,
    author_is_bot: bool,
    ignore_bots: bool,
) -> bool {
    if bot_id == Some(&author) {
        return false;
    }
    !(author_is_bot && ignore_bots)
}

impl DiscordHandler {
    fn accepts(&self, msg: &Message) -> bool {
        accepts_author(self.bot_id.get(), msg.author.id, msg.author.bot, self.config.ignore_bots)
    }

    /// Heartbeat latency of the shard that delivered an event, once measured.
    async fn gateway_latency(&self, shard_id: ShardId) -> Option<Duration> {
        let manager = {
            let guard = self.shards.lock().ok()?;
            guard.clone()?
        };
        let runners = manager.runners.lock().await;
        runners.get(&shard_id)?.latency
    }

    /// Fetch a message the store has not seen and append it. Returns false
    /// when the message could not be fetched or stored, or its author is
    /// filtered out.
    async fn backfill(&self, ctx: &Context, channel_id: ChannelId, message_id: MessageId) -> bool {
        let msg = match channel_id.message(ctx, message_id).await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, message_id = %message_id, "could not fetch reacted message");
                return false;
            }
        };
        if !self.accepts(&msg) {
            debug!(message_id = %message_id, "reacted message is from a filtered author");
            return false;
        }
        match self.relay.handle_message(&convert::to_message(&msg)) {
            Ok(_) => {
                debug!(message_id = %message_id, "backfilled reacted message");
                true
            }
            Err(e) => {
                warn!(error = %e, message_id = %message_id, "could not store reacted message");
                false
            }
        }
    }
}

/// Post the outcome of a relay call back to the channel.
async fn present(
    http: &Http,
    channel_id: ChannelId,
    reply_to: MessageId,
    result: Result<RelayOutcome, RelayError>,
    requester: Option<&str>,
) {
    let sent = match result {
        Ok(RelayOutcome::Completed(outcome)) => {
            let view = embed::result_view(&outcome, requester);
            send::send_embed(http, channel_id, view.to_create_embed(), Some(reply_to)).await
        }
        Ok(RelayOutcome::Ignored(reason)) => {
            debug!(?reason, "relay ignored event");
            Ok(())
        }
        Ok(RelayOutcome::Stored) => Ok(()),
        Err(RelayError::Dispatch { original, source }) => match source.raw_reply() {
            // Degraded response: the reply arrived but had no sections.
            Some(raw) => {
                let text = format!("⚠️ Could not format the reply, showing it as received:\n\n{raw}");
                send::send_response(http, channel_id, &text, Some(reply_to)).await
            }
            None => {
                let view = embed::error_view(&original, &source);
                send::send_embed(http, channel_id, view.to_create_embed(), Some(reply_to)).await
            }
        },
        Err(RelayError::Storage(e)) => {
            warn!(error = %e, "storage error while relaying");
            send::send_response(http, channel_id, "❌ Could not read message history.", Some(reply_to)).await
        }
    };

    if let Err(e) = sent {
        warn!(error = %e, channel_id = %channel_id, "Discord send failed");
    }
}
