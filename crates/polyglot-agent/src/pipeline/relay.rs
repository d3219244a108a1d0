use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use polyglot_core::config::PolyglotConfig;
use polyglot_core::types::{InboundEvent, Message, MessageId, ReactionAdded, ScopeId};
use polyglot_store::{MessageStore, StorageError};
use tracing::{debug, info, warn};

use crate::dispatcher::{DispatchError, TaskAction, TaskDispatcher, TaskRequest, TaskResult};
use crate::provider::LlmProvider;
use crate::selector::{ContextSelector, ContextWindow};

use super::triggers::TriggerSet;

/// Why an event produced no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The scope is not on the allow-list.
    ScopeNotAllowed,
    /// The reaction emoji is not a configured trigger.
    NotATrigger,
    /// The reacted message is not in the store.
    MessageNotFound,
}

/// A completed dispatch, ready for presentation.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// The message the trigger was placed on. `None` for free text.
    pub message: Option<Message>,
    pub request: TaskRequest,
    pub result: TaskResult,
    pub window: ContextWindow,
}

#[derive(Debug)]
pub enum RelayOutcome {
    /// A new message was appended to the store.
    Stored,
    Ignored(IgnoreReason),
    Completed(Box<TaskOutcome>),
}

/// Errors that leave the pipeline. Pruning failures never appear here.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("dispatch failed: {source}")]
    Dispatch {
        /// Text that was sent for processing.
        original: String,
        source: DispatchError,
    },
}

/// Wires the message store, the context selector and the task dispatcher to
/// the two inbound event kinds.
///
/// One `Relay` is built at startup and shared (behind an `Arc`) by every
/// event handler. Handlers for different events run concurrently.
pub struct Relay {
    store: Arc<MessageStore>,
    selector: ContextSelector,
    dispatcher: TaskDispatcher,
    triggers: TriggerSet,
    allowed_scopes: HashSet<String>,
    command_context: usize,
}

impl Relay {
    pub fn new(
        store: Arc<MessageStore>,
        provider: Arc<dyn LlmProvider>,
        config: &PolyglotConfig,
    ) -> Self {
        let relay = &config.relay;
        let triggers = TriggerSet::from_config(&relay.triggers);
        if triggers.is_empty() {
            warn!("no trigger emoji configured, reactions will be ignored");
        }
        Self {
            selector: ContextSelector::new(
                Arc::clone(&store),
                Arc::clone(&provider),
                &config.provider,
                relay.context_window,
            ),
            dispatcher: TaskDispatcher::new(provider, &config.provider, &relay.default_target),
            triggers,
            allowed_scopes: relay.allowed_scopes.iter().cloned().collect(),
            command_context: relay.command_context,
            store,
        }
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    pub fn triggers(&self) -> &TriggerSet {
        &self.triggers
    }

    /// An empty allow-list admits every scope.
    pub fn scope_allowed(&self, scope_id: &ScopeId) -> bool {
        self.allowed_scopes.is_empty() || self.allowed_scopes.contains(scope_id.as_str())
    }

    pub fn is_trigger(&self, emoji: &str) -> bool {
        self.triggers.contains(emoji)
    }

    pub async fn handle_event(&self, event: &InboundEvent) -> Result<RelayOutcome, RelayError> {
        match event {
            InboundEvent::MessageCreated(msg) => self.handle_message(msg),
            InboundEvent::ReactionAdded(reaction) => self.handle_reaction(reaction).await,
        }
    }

    /// Append an observed message to the store.
    pub fn handle_message(&self, msg: &Message) -> Result<RelayOutcome, RelayError> {
        if !self.scope_allowed(&msg.scope_id) {
            return Ok(RelayOutcome::Ignored(IgnoreReason::ScopeNotAllowed));
        }
        self.store.append(msg)?;
        debug!(scope_id = %msg.scope_id, message_id = %msg.id, "message stored");
        Ok(RelayOutcome::Stored)
    }

    /// Run the trigger's task on the reacted message.
    ///
    /// The adapter is expected to have stored the message first; a message
    /// the store has never seen is ignored.
    pub async fn handle_reaction(
        &self,
        reaction: &ReactionAdded,
    ) -> Result<RelayOutcome, RelayError> {
        if !self.scope_allowed(&reaction.scope_id) {
            return Ok(RelayOutcome::Ignored(IgnoreReason::ScopeNotAllowed));
        }
        let Some(action) = self.triggers.action_for(&reaction.emoji) else {
            return Ok(RelayOutcome::Ignored(IgnoreReason::NotATrigger));
        };
        let Some(message) = self.store.get(&reaction.message_id)? else {
            debug!(message_id = %reaction.message_id, "reacted message not in store");
            return Ok(RelayOutcome::Ignored(IgnoreReason::MessageNotFound));
        };

        info!(
            scope_id = %reaction.scope_id,
            message_id = %reaction.message_id,
            emoji = %reaction.emoji,
            actor_id = %reaction.actor_id,
            "trigger fired"
        );

        let window = self.selector.select(&reaction.scope_id, &message).await?;
        let request = TaskRequest::new(&message.body, window.relevant.clone(), action.clone());
        let outcome = self.dispatch(Some(message), request, window).await?;
        Ok(RelayOutcome::Completed(Box::new(outcome)))
    }

    /// Translate free text (the `translate` command), using the most recent
    /// messages of `scope_id` before `before` as context. `exclude` drops the
    /// message that carried the command. A leading directive still applies.
    pub async fn translate_text(
        &self,
        scope_id: &ScopeId,
        text: &str,
        before: DateTime<Utc>,
        exclude: Option<&MessageId>,
    ) -> Result<RelayOutcome, RelayError> {
        if !self.scope_allowed(scope_id) {
            return Ok(RelayOutcome::Ignored(IgnoreReason::ScopeNotAllowed));
        }

        let window = self
            .selector
            .select_window(scope_id, text, before, exclude, self.command_context)
            .await?;
        let request = TaskRequest::new(
            text,
            window.relevant.clone(),
            TaskAction::Translate { target: None },
        );
        let outcome = self.dispatch(None, request, window).await?;
        Ok(RelayOutcome::Completed(Box::new(outcome)))
    }

    async fn dispatch(
        &self,
        message: Option<Message>,
        request: TaskRequest,
        window: ContextWindow,
    ) -> Result<TaskOutcome, RelayError> {
        match self.dispatcher.dispatch(&request).await {
            Ok(result) => {
                info!(
                    kind = ?result.kind,
                    candidates = window.candidates.len(),
                    relevant = window.relevant.len(),
                    pruning = ?window.pruning,
                    "task completed"
                );
                Ok(TaskOutcome {
                    message,
                    request,
                    result,
                    window,
                })
            }
            Err(source) => {
                warn!(error = %source, "task dispatch failed");
                Err(RelayError::Dispatch {
                    original: request.original,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ChatResponse, ProviderError};
    use crate::reply::TONE;
    use crate::selector::Pruning;
    use async_trait::async_trait;
    use polyglot_core::config::TriggerConfig;
    use std::sync::Mutex;

    /// Answers pruning prompts and task prompts with separate scripts.
    struct RoutedProvider {
        prune: Option<String>,
        task: String,
        prompts: Mutex<Vec<String>>,
    }

    impl RoutedProvider {
        fn new(prune: Option<&str>, task: &str) -> Arc<Self> {
            Arc::new(Self {
                prune: prune.map(String::from),
                task: task.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmProvider for RoutedProvider {
        fn name(&self) -> &str {
            "routed"
        }

        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            let prompt = req.messages[0].content.clone();
            let is_prune = prompt.contains("context filtering assistant");
            self.prompts.lock().unwrap().push(prompt);
            let content = if is_prune {
                self.prune
                    .clone()
                    .ok_or_else(|| ProviderError::Timeout { secs: 30 })?
            } else {
                self.task.clone()
            };
            Ok(ChatResponse {
                content,
                model: req.model.clone(),
                tokens_in: 0,
                tokens_out: 0,
                stop_reason: "stop".to_string(),
            })
        }
    }

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap()
    }

    fn msg(id: &str, scope: &str, body: &str, ms: i64) -> Message {
        Message::new(id, scope, "u1", "alice", body, at(ms))
    }

    fn reaction(scope: &str, id: &str, emoji: &str) -> ReactionAdded {
        ReactionAdded {
            scope_id: ScopeId::from(scope),
            message_id: MessageId::from(id),
            emoji: emoji.to_string(),
            actor_id: "u9".into(),
        }
    }

    fn relay_with(provider: Arc<RoutedProvider>, config: PolyglotConfig) -> Relay {
        let store = Arc::new(MessageStore::open_in_memory().unwrap());
        Relay::new(store, provider, &config)
    }

    fn completed(outcome: RelayOutcome) -> TaskOutcome {
        match outcome {
            RelayOutcome::Completed(o) => *o,
            other => panic!("expected completed outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reaction_runs_selection_and_dispatch() {
        let provider = RoutedProvider::new(Some("[1]"), "[Translation]\nHello\n[Tone Notes]\nwarm");
        let relay = relay_with(provider.clone(), PolyglotConfig::default());
        relay.handle_message(&msg("m1", "general", "昨日の会議", 1)).unwrap();
        relay.handle_message(&msg("m2", "general", "天気", 2)).unwrap();
        relay.handle_message(&msg("m3", "general", "こんにちは", 3)).unwrap();

        let outcome = completed(
            relay
                .handle_reaction(&reaction("general", "m3", "🌐"))
                .await
                .unwrap(),
        );
        assert_eq!(outcome.message.unwrap().id.as_str(), "m3");
        assert_eq!(outcome.window.candidates.len(), 2);
        assert_eq!(outcome.window.relevant[0].id.as_str(), "m2");
        assert_eq!(outcome.window.pruning, Pruning::Applied);
        assert_eq!(outcome.result.primary, "Hello");
        assert_eq!(outcome.result.annotation(TONE), "warm");
        assert_eq!(provider.calls(), 2);
        assert!(provider.last_prompt().contains("- alice: 天気"));
    }

    #[tokio::test]
    async fn unknown_emoji_is_ignored_without_calls() {
        let provider = RoutedProvider::new(Some("[]"), "[Translation]\nx");
        let relay = relay_with(provider.clone(), PolyglotConfig::default());
        relay.handle_message(&msg("m1", "general", "hi", 1)).unwrap();

        let outcome = relay
            .handle_reaction(&reaction("general", "m1", "👍"))
            .await
            .unwrap();
        assert!(matches!(outcome, RelayOutcome::Ignored(IgnoreReason::NotATrigger)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_message_is_ignored() {
        let provider = RoutedProvider::new(Some("[]"), "[Translation]\nx");
        let relay = relay_with(provider.clone(), PolyglotConfig::default());

        let outcome = relay
            .handle_reaction(&reaction("general", "missing", "🌐"))
            .await
            .unwrap();
        assert!(matches!(outcome, RelayOutcome::Ignored(IgnoreReason::MessageNotFound)));
    }

    #[tokio::test]
    async fn scope_allow_list_blocks_storage_and_triggers() {
        let provider = RoutedProvider::new(Some("[]"), "[Translation]\nx");
        let mut config = PolyglotConfig::default();
        config.relay.allowed_scopes = vec!["general".to_string()];
        let relay = relay_with(provider.clone(), config);

        let stored = relay.handle_message(&msg("m1", "random", "hi", 1)).unwrap();
        assert!(matches!(stored, RelayOutcome::Ignored(IgnoreReason::ScopeNotAllowed)));
        assert_eq!(relay.store().count().unwrap(), 0);

        let outcome = relay
            .handle_reaction(&reaction("random", "m1", "🌐"))
            .await
            .unwrap();
        assert!(matches!(outcome, RelayOutcome::Ignored(IgnoreReason::ScopeNotAllowed)));
        assert!(relay.scope_allowed(&ScopeId::from("general")));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn task_trigger_uses_instruction() {
        let provider = RoutedProvider::new(None, "[Result]\nshort version");
        let mut config = PolyglotConfig::default();
        config.relay.triggers = vec![TriggerConfig::task("📝", "Summarize the message")];
        let relay = relay_with(provider.clone(), config);
        relay.handle_message(&msg("m1", "general", "a long story", 1)).unwrap();

        let outcome = completed(
            relay
                .handle_reaction(&reaction("general", "m1", "📝"))
                .await
                .unwrap(),
        );
        assert_eq!(outcome.result.primary, "short version");
        assert!(provider.last_prompt().contains("Summarize the message"));
    }

    #[tokio::test]
    async fn unparsed_reply_surfaces_raw_text() {
        let provider = RoutedProvider::new(Some("[]"), "I refuse to use sections");
        let relay = relay_with(provider, PolyglotConfig::default());
        relay.handle_message(&msg("m1", "general", "hola", 1)).unwrap();

        let err = relay
            .handle_reaction(&reaction("general", "m1", "🌐"))
            .await
            .unwrap_err();
        match err {
            RelayError::Dispatch { original, source } => {
                assert_eq!(original, "hola");
                assert_eq!(source.raw_reply(), Some("I refuse to use sections"));
            }
            other => panic!("expected dispatch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn translate_command_uses_command_context() {
        let provider = RoutedProvider::new(None, "[Translation]\nthanks");
        let mut config = PolyglotConfig::default();
        config.relay.command_context = 2;
        let relay = relay_with(provider.clone(), config);
        for i in 1..=4 {
            relay
                .handle_message(&msg(&format!("m{i}"), "general", &format!("line {i}"), i))
                .unwrap();
        }
        relay
            .handle_message(&msg("cmd", "general", "!translate 谢谢", 5))
            .unwrap();

        let outcome = completed(
            relay
                .translate_text(&ScopeId::from("general"), "谢谢", at(6), Some(&MessageId::from("cmd")))
                .await
                .unwrap(),
        );
        assert!(outcome.message.is_none());
        let ids: Vec<_> = outcome.window.candidates.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m4"]);
        // Pruning timed out, so the candidate was kept.
        assert_eq!(outcome.window.pruning, Pruning::FailedOpen);
        assert_eq!(outcome.result.primary, "thanks");
    }

    #[tokio::test]
    async fn handle_event_routes_both_kinds() {
        let provider = RoutedProvider::new(Some("[]"), "[Translation]\nhi");
        let relay = relay_with(provider, PolyglotConfig::default());

        let stored = relay
            .handle_event(&InboundEvent::MessageCreated(msg("m1", "general", "salut", 1)))
            .await
            .unwrap();
        assert!(matches!(stored, RelayOutcome::Stored));

        let done = relay
            .handle_event(&InboundEvent::ReactionAdded(reaction("general", "m1", "🌐")))
            .await
            .unwrap();
        assert!(matches!(done, RelayOutcome::Completed(_)));
    }
}
