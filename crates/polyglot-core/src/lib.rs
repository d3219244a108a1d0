//! Shared types, configuration and errors for the polyglot relay.

pub mod config;
pub mod error;
pub mod types;

pub use config::PolyglotConfig;
pub use error::{PolyglotError, Result};
pub use types::{AuthorId, InboundEvent, Message, MessageId, ReactionAdded, ScopeId};
