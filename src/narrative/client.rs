//! Hosted chat-completion client
//!
//! The narrative stage talks to the model through the `NarrativeService`
//! trait so the HTTP client can be replaced with a scripted double.

use crate::errors::{Result, SynthError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Default chat-completions API base
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f64 = 0.3;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Role of a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One role-tagged prompt message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Text-generation backend
#[async_trait]
pub trait NarrativeService: Send + Sync {
    /// Submit the messages and return the reply text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Chat-completions request body
#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
}

/// Chat-completions response body
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the first choice's content, rejecting empty replies
fn reply_content(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| SynthError::NarrativeService(format!("Failed to parse reply: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| SynthError::NarrativeService("Reply contained no content".to_string()))
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f64,
    api_key: String,
}

impl ChatCompletionClient {
    /// Create client with the default endpoint and model
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(
            DEFAULT_BASE_URL,
            DEFAULT_MODEL,
            DEFAULT_TEMPERATURE,
            DEFAULT_TIMEOUT,
            api_key,
        )
    }

    /// Create client with custom configuration
    pub fn with_config(
        base_url: &str,
        model: &str,
        temperature: f64,
        timeout: Duration,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(SynthError::NarrativeService(
                "API credential is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SynthError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
            api_key,
        })
    }

    /// Create client reading the credential from an environment variable
    pub fn from_env(
        var: &str,
        base_url: &str,
        model: &str,
        temperature: f64,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = std::env::var(var).map_err(|_| {
            SynthError::NarrativeService(format!("Environment variable {} is not set", var))
        })?;
        Self::with_config(base_url, model, temperature, timeout, api_key)
    }

    /// Get current model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}

#[async_trait]
impl NarrativeService for ChatCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        debug!(model = %self.model, url = %url, "Requesting narrative");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SynthError::NarrativeService(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SynthError::NarrativeService(format!("Failed to read reply: {}", e)))?;

        if !status.is_success() {
            return Err(SynthError::NarrativeService(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        reply_content(&body)
    }
}

/// Scripted service returning queued replies, recording every prompt
#[derive(Debug, Default)]
pub struct ScriptedNarrativeService {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedNarrativeService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service that always answers with `reply` once
    pub fn with_reply(reply: impl Into<String>) -> Self {
        let service = Self::new();
        service.push_reply(Ok(reply.into()));
        service
    }

    pub fn push_reply(&self, reply: Result<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NarrativeService for ScriptedNarrativeService {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(messages.to_vec());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| {
                Err(SynthError::NarrativeService(
                    "No scripted reply left".to_string(),
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ChatCompletionClient::new("sk-test").unwrap();
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
        assert_eq!(client.temperature(), DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_client_with_config() {
        let client = ChatCompletionClient::with_config(
            "http://localhost:8080/v1/",
            "local-model",
            0.0,
            Duration::from_secs(5),
            "key",
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
        assert_eq!(client.model(), "local-model");
    }

    #[test]
    fn test_empty_credential_rejected() {
        assert!(matches!(
            ChatCompletionClient::new("  "),
            Err(SynthError::NarrativeService(_))
        ));
    }

    #[test]
    fn test_missing_env_credential() {
        let err = ChatCompletionClient::from_env(
            "OUTCOMES_SYNTH_TEST_UNSET_KEY",
            DEFAULT_BASE_URL,
            DEFAULT_MODEL,
            DEFAULT_TEMPERATURE,
            DEFAULT_TIMEOUT,
        )
        .unwrap_err();
        assert!(err.to_string().contains("OUTCOMES_SYNTH_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let request = ChatRequest {
            model: "m",
            messages: &messages,
            temperature: 0.3,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["temperature"], 0.3);
    }

    #[test]
    fn test_reply_content() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "METHODS:\nx"}}]}"#;
        assert_eq!(reply_content(body).unwrap(), "METHODS:\nx");

        for empty in [
            r#"{"choices": []}"#,
            r#"{"choices": [{"message": {"content": null}}]}"#,
            r#"{"choices": [{"message": {"content": "   "}}]}"#,
            "not json",
        ] {
            assert!(matches!(
                reply_content(empty),
                Err(SynthError::NarrativeService(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_scripted_service() {
        let service = ScriptedNarrativeService::with_reply("hello");
        let reply = service.complete(&[ChatMessage::user("q")]).await.unwrap();
        assert_eq!(reply, "hello");
        assert_eq!(service.prompts().len(), 1);

        let exhausted = service.complete(&[ChatMessage::user("again")]).await;
        assert!(exhausted.is_err());
    }

    #[test]
    fn test_scripted_replies_in_order() {
        let service = ScriptedNarrativeService::new();
        service.push_reply(Ok("first".to_string()));
        service.push_reply(Err(SynthError::NarrativeService("down".to_string())));

        let first = tokio_test::block_on(service.complete(&[ChatMessage::user("a")]));
        assert_eq!(first.unwrap(), "first");
        let second = tokio_test::block_on(service.complete(&[ChatMessage::user("b")]));
        assert!(matches!(second, Err(SynthError::NarrativeService(_))));
        assert_eq!(service.prompts()[1][0].content, "b");
    }
}
