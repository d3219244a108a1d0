use std::sync::Arc;

use polyglot_core::config::ProviderConfig;
use polyglot_core::types::Message;
use tracing::{debug, info, warn};

use crate::directive::{self, Directive};
use crate::prompt::{build_task_prompt, build_translation_prompt};
use crate::provider::{ChatRequest, LlmProvider, ProviderError};
use crate::reply::{self, Annotation, ParsedReply};

/// What a trigger asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskAction {
    /// Translate into `target`, or into the default target when `None`.
    Translate { target: Option<String> },
    /// Apply a free-form instruction.
    Task { instruction: String },
}

impl TaskAction {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Translate { .. } => TaskKind::Translation,
            Self::Task { .. } => TaskKind::Task,
        }
    }
}

impl From<Directive> for TaskAction {
    fn from(d: Directive) -> Self {
        match d {
            Directive::Translate { target } => Self::Translate {
                target: Some(target),
            },
            Directive::Task { instruction } => Self::Task { instruction },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Translation,
    Task,
}

/// One dispatch: the text to work on, its context and the action to take.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    /// Message body as written, directive included.
    pub original: String,
    /// Text the action applies to (the body minus any leading directive).
    pub text: String,
    /// Context messages, most recent first.
    pub context: Vec<Message>,
    pub action: TaskAction,
    /// True when a directive in the body replaced the trigger's action.
    pub directive_applied: bool,
}

impl TaskRequest {
    /// Build a request for `body`. A leading directive in the body overrides
    /// `trigger_action` for this request only.
    pub fn new(body: &str, context: Vec<Message>, trigger_action: TaskAction) -> Self {
        let extracted = directive::extract(body);
        let (action, directive_applied) = match extracted.directive {
            Some(d) => (TaskAction::from(d), true),
            None => (trigger_action, false),
        };
        Self {
            original: body.to_string(),
            text: extracted.text,
            context,
            action,
            directive_applied,
        }
    }
}

/// Parsed reply of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub kind: TaskKind,
    pub primary: String,
    pub annotations: Vec<Annotation>,
}

impl TaskResult {
    /// Text of the named annotation, or `""` when the reply had none.
    pub fn annotation(&self, name: &str) -> &str {
        self.annotations
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.text.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("reasoning service call failed: {0}")]
    Provider(#[from] ProviderError),

    /// The reply came back but had none of the expected sections.
    #[error("reply could not be parsed into sections")]
    Unparsed { raw: String },
}

impl DispatchError {
    /// Raw reply text, when there was a reply at all.
    pub fn raw_reply(&self) -> Option<&str> {
        match self {
            Self::Unparsed { raw } => Some(raw),
            Self::Provider(_) => None,
        }
    }
}

/// Issues the single reasoning call for a trigger and parses its reply.
pub struct TaskDispatcher {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    default_target: String,
}

impl TaskDispatcher {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ProviderConfig, default_target: &str) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            default_target: default_target.to_string(),
        }
    }

    pub async fn dispatch(&self, req: &TaskRequest) -> Result<TaskResult, DispatchError> {
        // Prompts read oldest first.
        let context: Vec<&Message> = req.context.iter().rev().collect();

        let (prompt, layout) = match &req.action {
            TaskAction::Translate { target } => (
                build_translation_prompt(
                    &req.text,
                    &context,
                    target.as_deref(),
                    &self.default_target,
                ),
                &reply::TRANSLATION_LAYOUT,
            ),
            TaskAction::Task { instruction } => (
                build_task_prompt(&req.text, &context, instruction),
                &reply::TASK_LAYOUT,
            ),
        };

        debug!(
            provider = self.provider.name(),
            kind = ?req.action.kind(),
            context = context.len(),
            directive = req.directive_applied,
            "dispatching task"
        );

        let chat = ChatRequest::single(&self.model, prompt, self.max_tokens, self.temperature);
        let resp = self.provider.send(&chat).await?;

        info!(
            model = %resp.model,
            tokens_in = resp.tokens_in,
            tokens_out = resp.tokens_out,
            "task reply received"
        );

        match reply::parse(&resp.content, layout) {
            ParsedReply::Parsed {
                primary,
                annotations,
            } => Ok(TaskResult {
                kind: req.action.kind(),
                primary,
                annotations,
            }),
            ParsedReply::Unparsed { raw_text } => {
                warn!(len = raw_text.len(), "task reply had no recognisable sections");
                Err(DispatchError::Unparsed { raw: raw_text })
            }
        }
    }
}
