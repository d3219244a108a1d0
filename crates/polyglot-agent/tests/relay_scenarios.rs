//! End-to-end behaviour of the store, selector and dispatcher together.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use polyglot_agent::provider::{ChatRequest, ChatResponse};
use polyglot_agent::reply::{TERMS, TONE};
use polyglot_agent::{
    ContextSelector, DispatchError, LlmProvider, ProviderError, Pruning, Relay, RelayError,
    RelayOutcome, TaskAction, TaskDispatcher, TaskRequest,
};
use polyglot_core::config::{PolyglotConfig, ProviderConfig};
use polyglot_core::types::{Message, MessageId, ReactionAdded, ScopeId};
use polyglot_store::{MessageStore, RetentionSweeper};

enum Reply {
    Text(&'static str),
    Timeout,
}

/// Mock reasoning service: one script for pruning prompts, one for task prompts.
struct MockService {
    prune: Reply,
    task: Reply,
    prompts: Mutex<Vec<String>>,
}

impl MockService {
    fn new(prune: Reply, task: Reply) -> Arc<Self> {
        Arc::new(Self {
            prune,
            task,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn task_prompt(&self) -> String {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|p| !p.contains("context filtering assistant"))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for MockService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let prompt = req.messages[0].content.clone();
        let script = if prompt.contains("context filtering assistant") {
            &self.prune
        } else {
            &self.task
        };
        self.prompts.lock().unwrap().push(prompt);
        match script {
            Reply::Text(content) => Ok(ChatResponse {
                content: content.to_string(),
                model: req.model.clone(),
                tokens_in: 0,
                tokens_out: 0,
                stop_reason: "stop".to_string(),
            }),
            Reply::Timeout => Err(ProviderError::Timeout { secs: 30 }),
        }
    }
}

fn at(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap()
}

fn general(id: &str, body: &str, ms: i64) -> Message {
    Message::new(id, "general", "u1", "alice", body, at(ms))
}

fn seeded(n: i64) -> Arc<MessageStore> {
    let store = MessageStore::open_in_memory().unwrap();
    for i in 1..=n {
        store.append(&general(&format!("M{i}"), &format!("message {i}"), i)).unwrap();
    }
    Arc::new(store)
}

fn ids(msgs: &[Message]) -> Vec<String> {
    msgs.iter().map(|m| m.id.to_string()).collect()
}

#[test]
fn recent_returns_all_five_most_recent_first() {
    let store = seeded(5);
    let got = store.recent(&ScopeId::from("general"), at(6), 10).unwrap();
    assert_eq!(ids(&got), vec!["M5", "M4", "M3", "M2", "M1"]);
}

#[test]
fn recent_is_a_reversed_prefix_bounded_by_time_and_limit() {
    let store = seeded(8);
    let got = store.recent(&ScopeId::from("general"), at(7), 3).unwrap();
    assert_eq!(ids(&got), vec!["M6", "M5", "M4"]);
}

#[test]
fn expired_messages_never_come_back() {
    let store = seeded(6);
    let removed = store.expire(at(4)).unwrap();
    assert_eq!(removed, 3);

    let left = store.recent(&ScopeId::from("general"), at(1_000), usize::MAX).unwrap();
    assert!(left.iter().all(|m| m.created_at >= at(4)));
    assert_eq!(store.expire(at(4)).unwrap(), 0);
}

#[test]
fn sweeper_applies_retention_relative_to_sweep_time() {
    let store = seeded(3);
    let sweeper = RetentionSweeper::new(
        Arc::clone(&store),
        Duration::milliseconds(2),
        std::time::Duration::from_secs(60),
    );
    // now = 4ms, horizon 2ms: M1 (1ms) is older than the cutoff at 2ms.
    assert_eq!(sweeper.sweep_at(at(4)).unwrap(), 1);
    assert_eq!(store.count().unwrap(), 2);
}

#[tokio::test]
async fn pruning_timeout_fails_open() {
    let service = MockService::new(Reply::Timeout, Reply::Text("[Translation]\nok"));
    let selector = ContextSelector::new(seeded(5), service, &ProviderConfig::default(), 10);
    let trigger = general("T", "what did you mean?", 6);

    let window = selector.select(&ScopeId::from("general"), &trigger).await.unwrap();
    assert_eq!(window.relevant, window.candidates);
    assert_eq!(window.candidates.len(), 5);
    assert_eq!(window.pruning, Pruning::FailedOpen);
}

#[tokio::test]
async fn bogus_pruning_indices_stay_inside_the_window() {
    let service = MockService::new(Reply::Text("[2, 42, 0, 7]"), Reply::Text("[Translation]\nok"));
    let selector = ContextSelector::new(seeded(3), service, &ProviderConfig::default(), 10);
    let trigger = general("T", "hm", 10);

    let window = selector.select(&ScopeId::from("general"), &trigger).await.unwrap();
    let candidate_ids = ids(&window.candidates);
    assert!(ids(&window.relevant).iter().all(|id| candidate_ids.contains(id)));
    assert_eq!(ids(&window.relevant), vec!["M2"]);
    assert_eq!(window.pruning, Pruning::Applied);
}

#[tokio::test]
async fn empty_scope_dispatches_with_no_context() {
    let service = MockService::new(Reply::Text("[1]"), Reply::Text("[Translation]\nHello"));
    let store = Arc::new(MessageStore::open_in_memory().unwrap());
    let relay = Relay::new(Arc::clone(&store), service.clone(), &PolyglotConfig::default());

    let first = general("only", "你好", 1);
    relay.handle_message(&first).unwrap();
    let outcome = relay
        .handle_reaction(&ReactionAdded {
            scope_id: ScopeId::from("general"),
            message_id: MessageId::from("only"),
            emoji: "🌐".to_string(),
            actor_id: "u2".into(),
        })
        .await
        .unwrap();

    let RelayOutcome::Completed(outcome) = outcome else {
        panic!("expected a completed dispatch");
    };
    assert!(outcome.window.relevant.is_empty());
    assert_eq!(outcome.window.pruning, Pruning::Skipped);
    assert_eq!(outcome.result.primary, "Hello");
    assert!(!service.task_prompt().contains("Relevant conversation context"));
}

#[tokio::test]
async fn missing_annotation_sections_are_empty() {
    let service = MockService::new(Reply::Text("[]"), Reply::Text("[Translation]\nbonjour"));
    let dispatcher = TaskDispatcher::new(service, &ProviderConfig::default(), "English");
    let req = TaskRequest::new("hello", Vec::new(), TaskAction::Translate { target: Some("French".into()) });

    let result = dispatcher.dispatch(&req).await.unwrap();
    assert_eq!(result.primary, "bonjour");
    assert_eq!(result.annotation(TERMS), "");
    assert_eq!(result.annotation(TONE), "");
}

#[tokio::test]
async fn unstructured_reply_is_a_dispatch_error_with_raw_text() {
    let raw = "I'm not sure what you want me to do.";
    let service = MockService::new(Reply::Text("[]"), Reply::Text(raw));
    let dispatcher = TaskDispatcher::new(service, &ProviderConfig::default(), "English");
    let req = TaskRequest::new("hello", Vec::new(), TaskAction::Translate { target: None });

    match dispatcher.dispatch(&req).await {
        Err(DispatchError::Unparsed { raw: got }) => assert_eq!(got, raw),
        other => panic!("expected Unparsed, got {other:?}"),
    }
}

#[tokio::test]
async fn directive_overrides_the_trigger_target() {
    let service = MockService::new(Reply::Text("[]"), Reply::Text("[Translation]\nこんにちは"));
    let store = Arc::new(MessageStore::open_in_memory().unwrap());
    let relay = Relay::new(store, service.clone(), &PolyglotConfig::default());

    relay
        .handle_message(&general("D", "Translate to Japanese: hello", 1))
        .unwrap();
    // 🇺🇸 maps to English by default; the directive wins.
    let outcome = relay
        .handle_reaction(&ReactionAdded {
            scope_id: ScopeId::from("general"),
            message_id: MessageId::from("D"),
            emoji: "🇺🇸".to_string(),
            actor_id: "u2".into(),
        })
        .await
        .unwrap();

    let RelayOutcome::Completed(outcome) = outcome else {
        panic!("expected a completed dispatch");
    };
    assert_eq!(
        outcome.request.action,
        TaskAction::Translate {
            target: Some("Japanese".to_string())
        }
    );
    assert!(outcome.request.directive_applied);
    let prompt = service.task_prompt();
    assert!(prompt.contains("into Japanese."));
    assert!(prompt.contains("\"hello\""));
}

#[tokio::test]
async fn failed_dispatch_does_not_disturb_history() {
    let service = MockService::new(Reply::Text("[]"), Reply::Timeout);
    let store = Arc::new(MessageStore::open_in_memory().unwrap());
    let relay = Relay::new(Arc::clone(&store), service, &PolyglotConfig::default());
    relay.handle_message(&general("A", "one", 1)).unwrap();
    relay.handle_message(&general("B", "two", 2)).unwrap();

    let reaction = ReactionAdded {
        scope_id: ScopeId::from("general"),
        message_id: MessageId::from("B"),
        emoji: "🌐".to_string(),
        actor_id: "u2".into(),
    };
    let err = relay.handle_reaction(&reaction).await.unwrap_err();
    assert!(matches!(
        err,
        RelayError::Dispatch {
            source: DispatchError::Provider(ProviderError::Timeout { .. }),
            ..
        }
    ));

    // Subsequent events are unaffected.
    assert_eq!(store.count().unwrap(), 2);
    relay.handle_message(&general("C", "three", 3)).unwrap();
    assert_eq!(store.count().unwrap(), 3);
}
