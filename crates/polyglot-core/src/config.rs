use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PolyglotError, Result};

pub const DEFAULT_CONTEXT_WINDOW: usize = 10;
pub const DEFAULT_COMMAND_CONTEXT: usize = 5;
pub const DEFAULT_RETENTION_DAYS: u32 = 7;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_TARGET_LANGUAGE: &str = "English";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Upper bound on `relay.retention_days` (about a century).
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Top-level config (polyglot.toml + POLYGLOT_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolyglotConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub discord: Option<DiscordConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Context, retention and trigger policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Number of preceding messages offered to the pruning step.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    /// Context size for the direct translate command.
    #[serde(default = "default_command_context")]
    pub command_context: usize,
    /// Messages older than this many days are removed by the sweeper.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Scopes the bot acts on. Empty means every scope.
    #[serde(default)]
    pub allowed_scopes: Vec<String>,
    /// Target language when neither the trigger nor a directive names one.
    #[serde(default = "default_target")]
    pub default_target: String,
    #[serde(default = "default_triggers")]
    pub triggers: Vec<TriggerConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
            command_context: DEFAULT_COMMAND_CONTEXT,
            retention_days: DEFAULT_RETENTION_DAYS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            allowed_scopes: Vec::new(),
            default_target: default_target(),
            triggers: default_triggers(),
        }
    }
}

impl RelayConfig {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Maps one reaction emoji to what it asks for.
///
/// With neither `target` nor `task` set the trigger translates into the
/// relay's default target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub emoji: String,
    /// Target language, e.g. "Japanese".
    #[serde(default)]
    pub target: Option<String>,
    /// Free-form instruction for a general task, e.g. "Summarize the message".
    #[serde(default)]
    pub task: Option<String>,
}

impl TriggerConfig {
    pub fn translate(emoji: &str, target: Option<&str>) -> Self {
        Self {
            emoji: emoji.to_string(),
            target: target.map(String::from),
            task: None,
        }
    }

    pub fn task(emoji: &str, instruction: &str) -> Self {
        Self {
            emoji: emoji.to_string(),
            target: None,
            task: Some(instruction.to_string()),
        }
    }

    /// Key this trigger is looked up by; see [`normalize_emoji`].
    pub fn key(&self) -> String {
        normalize_emoji(&self.emoji)
    }
}

/// Clients differ on whether they send the emoji presentation selector
/// (U+FE0F), so it is dropped before any comparison.
pub fn normalize_emoji(emoji: &str) -> String {
    emoji.trim().replace('\u{fe0f}', "")
}

/// OpenAI-compatible chat completions endpoint used for pruning and dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL including the version segment, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_prune_max_tokens")]
    pub prune_max_tokens: u32,
    #[serde(default = "default_prune_temperature")]
    pub prune_temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            prune_max_tokens: default_prune_max_tokens(),
            prune_temperature: default_prune_temperature(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Prefix for the text commands (`!ping`, `!translate`).
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// When true, messages from other bots are neither stored nor answered.
    #[serde(default = "bool_true")]
    pub ignore_bots: bool,
}

fn bool_true() -> bool {
    true
}
fn default_context_window() -> usize {
    DEFAULT_CONTEXT_WINDOW
}
fn default_command_context() -> usize {
    DEFAULT_COMMAND_CONTEXT
}
fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}
fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}
fn default_target() -> String {
    DEFAULT_TARGET_LANGUAGE.to_string()
}
fn default_triggers() -> Vec<TriggerConfig> {
    vec![
        TriggerConfig::translate("\u{1f310}", None),                       // 🌐
        TriggerConfig::translate("\u{1f1ef}\u{1f1f5}", Some("Japanese")), // 🇯🇵
        TriggerConfig::translate("\u{1f1e8}\u{1f1f3}", Some("Chinese (Simplified)")), // 🇨🇳
        TriggerConfig::translate("\u{1f1fa}\u{1f1f8}", Some("English")), // 🇺🇸
        TriggerConfig::task("\u{1f4dd}", "Summarize the message"),         // 📝
    ]
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_temperature() -> f32 {
    0.3
}
fn default_prune_max_tokens() -> u32 {
    500
}
fn default_prune_temperature() -> f32 {
    0.1
}
fn default_command_prefix() -> String {
    "!".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.polyglot/polyglot.db", home)
}

impl PolyglotConfig {
    /// Load config from a TOML file with POLYGLOT_* env var overrides.
    ///
    /// Nested keys use a double underscore: `POLYGLOT_PROVIDER__API_KEY`.
    /// A missing file is not an error; every section has defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        debug!(path = %path, "loading config");

        let config: PolyglotConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("POLYGLOT_").split("__"))
            .extract()
            .map_err(|e| PolyglotError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse config from an in-memory TOML document (no env overrides).
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: PolyglotConfig = Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .map_err(|e| PolyglotError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.relay.context_window == 0 {
            return Err(PolyglotError::Config(
                "relay.context_window must be at least 1".to_string(),
            ));
        }
        if self.relay.retention_days > MAX_RETENTION_DAYS {
            return Err(PolyglotError::Config(format!(
                "relay.retention_days must be at most {MAX_RETENTION_DAYS}"
            )));
        }
        if self.relay.sweep_interval_secs == 0 {
            return Err(PolyglotError::Config(
                "relay.sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for trigger in &self.relay.triggers {
            let key = trigger.key();
            if key.is_empty() {
                return Err(PolyglotError::Config("trigger emoji is empty".to_string()));
            }
            if trigger.target.is_some() && trigger.task.is_some() {
                return Err(PolyglotError::Config(format!(
                    "trigger {} sets both target and task",
                    trigger.emoji
                )));
            }
            if !seen.insert(key) {
                return Err(PolyglotError::Config(format!(
                    "trigger {} is configured twice",
                    trigger.emoji
                )));
            }
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.polyglot/polyglot.toml", home)
}
