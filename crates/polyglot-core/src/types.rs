use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a conversation scope (a channel, or a thread inside one).
///
/// Message history and context windows are partitioned by scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub String);

impl ScopeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ScopeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ScopeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque message identifier assigned by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque identifier of a message author or reaction actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorId(pub String);

impl AuthorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AuthorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AuthorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One observed chat message. A repeated id updates body and author name only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub scope_id: ScopeId,
    pub author_id: AuthorId,
    /// Display name at the time the message was seen. Used only for prompts.
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        id: impl Into<MessageId>,
        scope_id: impl Into<ScopeId>,
        author_id: impl Into<AuthorId>,
        author_name: impl Into<String>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            scope_id: scope_id.into(),
            author_id: author_id.into(),
            author_name: author_name.into(),
            body: body.into(),
            created_at,
        }
    }

    /// Name shown for this message in prompts; falls back to the author id.
    pub fn display_author(&self) -> &str {
        if self.author_name.trim().is_empty() {
            self.author_id.as_str()
        } else {
            &self.author_name
        }
    }
}

/// A reaction placed on a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionAdded {
    pub scope_id: ScopeId,
    pub message_id: MessageId,
    /// Unicode emoji, or the name of a custom emoji.
    pub emoji: String,
    pub actor_id: AuthorId,
}

/// Events delivered by the chat platform adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    MessageCreated(Message),
    ReactionAdded(ReactionAdded),
}

impl InboundEvent {
    pub fn scope_id(&self) -> &ScopeId {
        match self {
            InboundEvent::MessageCreated(m) => &m.scope_id,
            InboundEvent::ReactionAdded(r) => &r.scope_id,
        }
    }
}
