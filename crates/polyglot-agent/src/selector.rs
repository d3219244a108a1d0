//! Context window retrieval and pruning.
//!
//! The selector reads the last N messages of a scope that precede the trigger
//! and asks the reasoning service which of them share the trigger's topic.
//! Pruning is an optional refinement: when the call fails, its reply cannot
//! be read, or it selects nothing, every candidate is kept.

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use polyglot_core::config::ProviderConfig;
use polyglot_core::types::{Message, MessageId, ScopeId};
use polyglot_store::{MessageStore, StorageError};
use regex::Regex;
use tracing::{debug, warn};

use crate::prompt::build_prune_prompt;
use crate::provider::{ChatRequest, LlmProvider, ProviderError};

static INDEX_ARRAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[\d,\s]*\]").unwrap());

/// How `relevant` was derived from `candidates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pruning {
    /// No candidates, so no pruning call was made.
    Skipped,
    /// The service's selection was applied.
    Applied,
    /// The pruning call failed or selected nothing; all candidates were kept.
    FailedOpen,
}

/// Candidate messages preceding a trigger and the subset judged relevant.
///
/// Both lists are most recent first; `relevant` is always a subsequence of
/// `candidates`.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    pub candidates: Vec<Message>,
    pub relevant: Vec<Message>,
    pub pruning: Pruning,
}

impl ContextWindow {
    fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            relevant: Vec::new(),
            pruning: Pruning::Skipped,
        }
    }
}

/// Why a pruning call produced no usable selection. Absorbed by the selector.
#[derive(Debug, thiserror::Error)]
pub enum ContextFetchFailure {
    #[error("pruning call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("pruning reply has no index array: {0:?}")]
    Unreadable(String),

    #[error("pruning reply selected no candidate")]
    NothingSelected,
}

pub struct ContextSelector {
    store: Arc<MessageStore>,
    provider: Arc<dyn LlmProvider>,
    model: String,
    window_size: usize,
    prune_max_tokens: u32,
    prune_temperature: f32,
}

impl ContextSelector {
    pub fn new(
        store: Arc<MessageStore>,
        provider: Arc<dyn LlmProvider>,
        config: &ProviderConfig,
        window_size: usize,
    ) -> Self {
        Self {
            store,
            provider,
            model: config.model.clone(),
            window_size,
            prune_max_tokens: config.prune_max_tokens,
            prune_temperature: config.prune_temperature,
        }
    }

    /// Build the context window for `trigger`.
    ///
    /// Only storage failures are returned; pruning failures fall back to the
    /// unpruned candidates.
    pub async fn select(
        &self,
        scope_id: &ScopeId,
        trigger: &Message,
    ) -> Result<ContextWindow, StorageError> {
        self.select_window(
            scope_id,
            &trigger.body,
            trigger.created_at,
            Some(&trigger.id),
            self.window_size,
        )
        .await
    }

    /// Like [`select`](Self::select) for text that is not itself a stored
    /// trigger: `body` is the text to match against, `before` bounds the
    /// history, and `exclude` drops one message (typically the command that
    /// carried `body`).
    pub async fn select_window(
        &self,
        scope_id: &ScopeId,
        body: &str,
        before: DateTime<Utc>,
        exclude: Option<&MessageId>,
        limit: usize,
    ) -> Result<ContextWindow, StorageError> {
        let mut candidates = self.store.recent(scope_id, before, limit)?;
        if let Some(id) = exclude {
            candidates.retain(|m| &m.id != id);
        }

        if candidates.is_empty() {
            debug!(scope_id = %scope_id, "no prior messages, skipping pruning");
            return Ok(ContextWindow::empty());
        }

        let window = match self.prune(body, &candidates).await {
            Ok(keep) => {
                let relevant = candidates
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| keep.contains(i))
                    .map(|(_, m)| m.clone())
                    .collect();
                ContextWindow {
                    candidates,
                    relevant,
                    pruning: Pruning::Applied,
                }
            }
            Err(e) => {
                warn!(scope_id = %scope_id, error = %e, "context pruning failed, using all candidates");
                ContextWindow {
                    relevant: candidates.clone(),
                    candidates,
                    pruning: Pruning::FailedOpen,
                }
            }
        };

        debug!(
            scope_id = %scope_id,
            candidates = window.candidates.len(),
            relevant = window.relevant.len(),
            "context window selected"
        );
        Ok(window)
    }

    /// One pruning call. Returns 0-based indices into `candidates`.
    async fn prune(
        &self,
        body: &str,
        candidates: &[Message],
    ) -> Result<BTreeSet<usize>, ContextFetchFailure> {
        let prompt = build_prune_prompt(body, candidates);
        let req = ChatRequest::single(
            &self.model,
            prompt,
            self.prune_max_tokens,
            self.prune_temperature,
        );
        let resp = self.provider.send(&req).await?;
        parse_indices(&resp.content, candidates.len())
    }
}

/// Read the first integer array in `reply` as 1-based indices.
///
/// Indices outside `1..=len` are dropped, so the result never references a
/// message that was not offered. A selection left empty (`[]`, or only
/// out-of-range indices) is [`ContextFetchFailure::NothingSelected`].
pub fn parse_indices(reply: &str, len: usize) -> Result<BTreeSet<usize>, ContextFetchFailure> {
    let array = INDEX_ARRAY
        .find(reply)
        .ok_or_else(|| ContextFetchFailure::Unreadable(reply.to_string()))?;
    let inner = array.as_str().trim_start_matches('[').trim_end_matches(']');

    let mut keep = BTreeSet::new();
    for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<usize>() {
            Ok(n) if (1..=len).contains(&n) => {
                keep.insert(n - 1);
            }
            Ok(n) => debug!(index = n, len, "ignoring out-of-range pruning index"),
            Err(_) => return Err(ContextFetchFailure::Unreadable(reply.to_string())),
        }
    }
    if keep.is_empty() {
        return Err(ContextFetchFailure::NothingSelected);
    }
    Ok(keep)
}
