use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError, Role};

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl OpenAiProvider {
    /// `base_url` includes the version segment, e.g. `https://api.openai.com/v1`.
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, reqwest::Error> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder.send().await
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            ProviderError::Http(e)
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(req);

        debug!(model = %req.model, "sending request to chat completions endpoint");

        let resp = retry_on_connect(|| self.post(&body))
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|s| s * 1000) // convert seconds to ms
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry,
            });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "chat completions API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                self.map_send_error(e)
            } else {
                ProviderError::Parse(e.to_string())
            }
        })?;

        parse_response(api_resp, &req.model)
    }
}

/// Run `attempt`, repeating it once only if the request never reached the
/// service. Error responses and timeouts are returned as they are.
async fn retry_on_connect<T, F, Fut>(mut attempt: F) -> Result<T, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    match attempt().await {
        Err(e) if e.is_connect() => {
            warn!(error = %e, "connect failed, retrying once");
            attempt().await
        }
        other => other,
    }
}

fn build_request_body(req: &ChatRequest) -> serde_json::Value {
    let mut messages = Vec::with_capacity(req.messages.len() + 1);
    if let Some(ref system) = req.system {
        messages.push(serde_json::json!({
            "role": Role::System,
            "content": system,
        }));
    }
    for m in &req.messages {
        messages.push(serde_json::json!({
            "role": m.role,
            "content": m.content,
        }));
    }

    serde_json::json!({
        "model": req.model,
        "messages": messages,
        "max_tokens": req.max_tokens,
        "temperature": req.temperature,
    })
}

fn parse_response(resp: ApiResponse, requested_model: &str) -> Result<ChatResponse, ProviderError> {
    let Some(choice) = resp.choices.into_iter().next() else {
        return Err(ProviderError::Parse("response has no choices".to_string()));
    };
    let content = choice.message.content.unwrap_or_default();

    Ok(ChatResponse {
        content,
        model: resp.model.unwrap_or_else(|| requested_model.to_string()),
        tokens_in: resp.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
        tokens_out: resp.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0),
        stop_reason: choice.finish_reason.unwrap_or_default(),
    })
}

// Chat completions response types (private, deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
