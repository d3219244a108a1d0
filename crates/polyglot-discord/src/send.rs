use serenity::builder::{CreateEmbed, CreateMessage};
use serenity::http::Http;
use serenity::model::id::{ChannelId, MessageId};

/// Maximum bytes per Discord message (2000 is the limit; we use 1950 for safety).
const CHUNK_MAX: usize = 1950;

/// Split `text` into chunks of at most [`CHUNK_MAX`] bytes, preferring
/// newline, then space boundaries. Never splits inside a UTF-8 sequence.
pub fn split_chunks(text: &str) -> Vec<String> {
    if text.len() <= CHUNK_MAX {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.len() > CHUNK_MAX {
        let mut end = CHUNK_MAX;
        while !remaining.is_char_boundary(end) {
            end -= 1;
        }
        let window = &remaining[..end];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(end);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    if !remaining.is_empty() {
        chunks.push(remaining.to_string());
    }

    chunks
}

/// Send `text` in chunks; the first chunk replies to `reply_to` when given.
pub async fn send_response(
    http: &Http,
    channel_id: ChannelId,
    text: &str,
    reply_to: Option<MessageId>,
) -> Result<(), serenity::Error> {
    for (i, chunk) in split_chunks(text).into_iter().enumerate() {
        let mut msg = CreateMessage::new().content(chunk);
        if i == 0 {
            if let Some(id) = reply_to {
                msg = msg.reference_message((channel_id, id));
            }
        }
        channel_id.send_message(http, msg).await?;
    }
    Ok(())
}

pub async fn send_embed(
    http: &Http,
    channel_id: ChannelId,
    embed: CreateEmbed,
    reply_to: Option<MessageId>,
) -> Result<(), serenity::Error> {
    let mut msg = CreateMessage::new().embed(embed);
    if let Some(id) = reply_to {
        msg = msg.reference_message((channel_id, id));
    }
    channel_id.send_message(http, msg).await?;
    Ok(())
}
