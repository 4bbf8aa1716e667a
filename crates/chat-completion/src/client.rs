//! OpenAI-compatible chat-completion client.

use crate::{CompletionError, CompletionResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use widget_config_and_utils::{Config, Secrets};

/// Turns one user message into one reply.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> CompletionResult<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// reqwest implementation of [`CompletionBackend`].
#[derive(Clone)]
pub struct CompletionClient {
    http_client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl CompletionClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_url` - Full chat-completions endpoint URL
    /// * `api_key` - Bearer credential from the host environment
    /// * `model` - Model identifier
    /// * `max_tokens` - Reply length cap
    pub fn new(
        api_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key,
            model: model.into(),
            max_tokens,
        }
    }

    pub fn from_config(config: &Config, secrets: &Secrets) -> CompletionResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;

        if secrets.completion_api_key.is_none() {
            warn!("no completion API key configured; chat replies will fail");
        }

        Ok(Self {
            http_client,
            api_url: config.completion_api_url.clone(),
            api_key: secrets.completion_api_key.clone(),
            model: config.completion_model.clone(),
            max_tokens: config.completion_max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(&self, prompt: &str) -> CompletionResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "requesting completion");

        let mut builder = self.http_client.post(&self.api_url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
            error!(status = %status, message = %message, "completion request failed");
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)?;
        let reply = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(CompletionError::EmptyResponse)?;

        debug!(reply_len = reply.len(), "completion received");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
            max_tokens: 150,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": "hello"}],
                "max_tokens": 150
            })
        );
    }

    #[test]
    fn test_from_config_uses_configured_model() {
        let config = Config {
            completion_model: "gpt-4o-mini".into(),
            ..Config::default()
        };
        let client = CompletionClient::from_config(&config, &Secrets::default()).unwrap();
        assert_eq!(client.model(), "gpt-4o-mini");
        assert_eq!(client.max_tokens, 150);
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = CompletionClient::new("https://llm.test", Some("sk-secret".into()), "m", 10);
        assert!(!format!("{:?}", client).contains("sk-secret"));
    }
}
