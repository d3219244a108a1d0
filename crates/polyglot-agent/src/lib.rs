//! Reasoning-service side of the relay: the provider client, prompt
//! construction, context pruning, task dispatch and the event pipeline that
//! ties them to the message store.

pub mod directive;
pub mod dispatcher;
pub mod language;
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod reply;
pub mod selector;

pub use dispatcher::{DispatchError, TaskAction, TaskDispatcher, TaskKind, TaskRequest, TaskResult};
pub use pipeline::{IgnoreReason, Relay, RelayError, RelayOutcome, TaskOutcome, TriggerSet};
pub use provider::{LlmProvider, ProviderError};
pub use selector::{ContextFetchFailure, ContextSelector, ContextWindow, Pruning};
