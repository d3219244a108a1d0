//! Discord adapter: turns gateway events into relay calls and renders the
//! results as embeds.

pub mod adapter;
pub mod convert;
pub mod embed;
pub mod error;
pub mod handler;
pub mod send;

pub use adapter::DiscordAdapter;
pub use error::DiscordError;
