//! Event pipeline shared by chat adapters.
//!
//! Adapters translate platform events into [`InboundEvent`]s and hand them
//! to a [`Relay`]. The relay stores messages, resolves reaction triggers, runs
//! the context selector and the task dispatcher, and returns a structured
//! outcome for the adapter to present.
//!
//! [`InboundEvent`]: polyglot_core::types::InboundEvent

pub mod relay;
pub mod triggers;

pub use relay::{IgnoreReason, Relay, RelayError, RelayOutcome, TaskOutcome};
pub use triggers::TriggerSet;
