//! Mapping from serenity models to relay types.

use chrono::{DateTime, Utc};
use serenity::model::channel::{Message as DiscordMessage, ReactionType};
use serenity::model::id::MessageId as DiscordMessageId;

use polyglot_core::types::{Message, ScopeId};

/// Milliseconds between the Unix epoch and the Discord epoch (2015-01-01).
const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

/// Creation time encoded in a Discord snowflake, at millisecond precision.
pub fn snowflake_time(id: u64) -> DateTime<Utc> {
    let ms = (id >> 22) + DISCORD_EPOCH_MS;
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default()
}

/// A thread carries its own channel id, so each thread is a separate scope.
pub fn scope_of(msg: &DiscordMessage) -> ScopeId {
    ScopeId(msg.channel_id.to_string())
}

/// Guild nickname, then global display name, then username.
pub fn display_name(nick: Option<&str>, global_name: Option<&str>, username: &str) -> String {
    nick.or(global_name)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(username)
        .to_string()
}

pub fn author_name(msg: &DiscordMessage) -> String {
    display_name(
        msg.member.as_ref().and_then(|m| m.nick.as_deref()),
        msg.author.global_name.as_deref(),
        &msg.author.name,
    )
}

pub fn to_message(msg: &DiscordMessage) -> Message {
    Message::new(
        msg.id.to_string(),
        scope_of(msg),
        msg.author.id.to_string(),
        author_name(msg),
        msg.content.clone(),
        message_time(msg.id),
    )
}

pub fn message_time(id: DiscordMessageId) -> DateTime<Utc> {
    snowflake_time(id.get())
}

/// Key used to look a reaction up in the trigger set. Custom emoji match by name.
pub fn emoji_key(emoji: &ReactionType) -> Option<String> {
    match emoji {
        ReactionType::Unicode(s) => Some(s.clone()),
        ReactionType::Custom { name, .. } => name.clone(),
        _ => None,
    }
}
