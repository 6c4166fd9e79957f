//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use droidrelay_core::{AgentError, CompletionService, Message};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.cometapi.com/v1";
pub const DEFAULT_MODEL: &str = "qwen3-coder";

/// `[completion]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Secret holding the API key.
    pub api_key_secret: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.6,
            max_tokens: 2500,
            timeout_secs: 120,
            api_key_secret: "COMPLETION_API_KEY".to_string(),
        }
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Drop one pair of surrounding code fences, keeping an embedded reply intact.
pub fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    {
        Some(inner) => {
            // An info string such as `json` sits on the opening fence line.
            let inner = match inner.split_once('\n') {
                Some((first, rest)) if !first.trim().contains(' ') && !first.contains('{') => rest,
                _ => inner,
            };
            inner.trim().to_string()
        }
        None => trimmed.to_string(),
    }
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct HttpCompletion {
    config: CompletionConfig,
    api_key: String,
    http: reqwest::Client,
}

impl HttpCompletion {
    pub fn new(config: CompletionConfig, api_key: String) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| AgentError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            config,
            api_key,
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionService for HttpCompletion {
    async fn send_message(&self, messages: &[Message]) -> droidrelay_core::Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.wire(),
                    content: &m.content,
                })
                .collect(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        debug!(messages = messages.len(), model = %self.config.model, "sending completion request");
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Completion(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::Completion(format!("cannot read response: {e}")))?;
        if !status.is_success() {
            return Err(AgentError::Completion(format!("HTTP {}: {body}", status.as_u16())));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AgentError::Completion("response has no choices".to_string()))?;
        Ok(strip_fences(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```\n{\"name\":\"x\"}\n```"), "{\"name\":\"x\"}");
        assert_eq!(strip_fences("```json\n{\"name\":\"x\"}\n```"), "{\"name\":\"x\"}");
        assert_eq!(strip_fences("plain text"), "plain text");
        assert_eq!(
            strip_fences("Run this:\n```sh\nls\n```"),
            "Run this:\n```sh\nls\n```"
        );
    }

    #[tokio::test]
    async fn test_send_message_maps_roles_and_parses_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer k-123")
            .match_body(Matcher::PartialJson(json!({
                "model": "qwen3-coder",
                "messages": [
                    {"role": "system", "content": "prompt"},
                    {"role": "user", "content": "typed"},
                    {"role": "user", "content": "hidden"}
                ]
            })))
            .with_status(200)
            .with_body(json!({"choices": [{"message": {"role": "assistant", "content": "```\nhello\n```"}}]}).to_string())
            .create_async()
            .await;

        let config = CompletionConfig {
            base_url: server.url(),
            ..CompletionConfig::default()
        };
        let client = HttpCompletion::new(config, "k-123".to_string()).unwrap();
        let reply = client
            .send_message(&[
                Message::system("prompt"),
                Message::visible_user("typed"),
                Message::user("hidden"),
            ])
            .await
            .unwrap();

        assert_eq!(reply, "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_is_completion_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(422)
            .with_body("bad request")
            .create_async()
            .await;

        let config = CompletionConfig {
            base_url: server.url(),
            ..CompletionConfig::default()
        };
        let client = HttpCompletion::new(config, "k".to_string()).unwrap();
        let err = client.send_message(&[Message::user("x")]).await.unwrap_err();
        assert!(matches!(err, AgentError::Completion(ref m) if m.contains("422")));
    }
}
