use std::collections::HashMap;

use polyglot_core::config::{normalize_emoji, TriggerConfig};

use crate::dispatcher::TaskAction;

/// Reaction emoji recognised as triggers and the action each one requests.
#[derive(Debug, Clone, Default)]
pub struct TriggerSet {
    actions: HashMap<String, TaskAction>,
}

impl TriggerSet {
    pub fn from_config(triggers: &[TriggerConfig]) -> Self {
        let actions = triggers
            .iter()
            .map(|t| {
                let action = match &t.task {
                    Some(instruction) => TaskAction::Task {
                        instruction: instruction.clone(),
                    },
                    None => TaskAction::Translate {
                        target: t.target.clone(),
                    },
                };
                (t.key(), action)
            })
            .collect();
        Self { actions }
    }

    pub fn action_for(&self, emoji: &str) -> Option<&TaskAction> {
        self.actions.get(&normalize_emoji(emoji))
    }

    pub fn contains(&self, emoji: &str) -> bool {
        self.action_for(emoji).is_some()
    }

    /// Configured trigger emoji, sorted.
    pub fn emoji(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
