use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single message in the prompt sent to the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    /// Optional system message, prepended when set.
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatRequest {
    /// A single-turn request: one user prompt, no system message.
    pub fn single(model: &str, prompt: String, max_tokens: u32, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            system: None,
            messages: vec![ChatMessage::user(prompt)],
            max_tokens,
            temperature,
        }
    }
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
}

/// One prompt in, one textual reply out.
///
/// Used for both the pruning call and the main task call. Implementations
/// must not retry error responses; the relay issues exactly one call per step.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// Send a chat request and wait for the full response.
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}
