//! Minimal OpenAI chat-completions client shared by emotion analysis and
//! script generation.

use crate::config::OpenAiConfig;
use crate::util::{is_http_retryable, retry_with_backoff, RetryConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const LOG_TARGET: &str = "openai";
const QUOTA_ERROR_CODE: &str = "insufficient_quota";

#[derive(thiserror::Error, Debug)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("openai quota exhausted")]
    QuotaExhausted,
    #[error("openai returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("openai returned no message content")]
    EmptyResponse,
}

impl ChatError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::Network(_) => true,
            ChatError::Api { status, .. } => is_http_retryable(*status),
            _ => false,
        }
    }
}

/// A 429 is only a quota problem when the body says so; otherwise it is
/// plain rate limiting and worth retrying.
pub(crate) fn is_quota_exhausted(status: u16, body: &str) -> bool {
    status == 429 && body.contains(QUOTA_ERROR_CODE)
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    config: Arc<OpenAiConfig>,
    retry: RetryConfig,
}

impl ChatClient {
    pub fn new(config: Arc<OpenAiConfig>) -> Self {
        Self {
            http: Client::new(),
            config,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sends one system + user exchange and returns the trimmed reply.
    pub async fn complete(&self, prompt: &ChatPrompt) -> Result<String, ChatError> {
        retry_with_backoff(&self.retry, || self.complete_once(prompt), ChatError::is_retryable).await
    }

    async fn complete_once(&self, prompt: &ChatPrompt) -> Result<String, ChatError> {
        let url = format!("{}/chat/completions", self.config.endpoint_root());
        let body = ChatRequest {
            model: &self.config.chat_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        tracing::debug!(target: LOG_TARGET, model = %self.config.chat_model, "sending chat completion");
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.config.api_key.expose())
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_quota_exhausted(status, &body) {
                return Err(ChatError::QuotaExhausted);
            }
            return Err(ChatError::Api { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        extract_content(parsed)
    }
}

fn extract_content(response: ChatResponse) -> Result<String, ChatError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_owned())
        .filter(|content| !content.is_empty())
        .ok_or(ChatError::EmptyResponse)
}
