//! Minimal OpenAI chat-completions client used to summarize diagnostic reports.

use ehr_demo_core::{ChatConfig, DemoError, SummaryRequest, Summarizer};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// OpenAI-compatible chat message. `content` may be null in responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl From<&SummaryRequest> for ChatCompletionRequest {
    fn from(request: &SummaryRequest) -> Self {
        Self {
            model: request.model.clone(),
            messages: vec![ChatMessage::user(request.prompt.clone())],
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChatCompletion {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChatChoice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl ChatCompletion {
    /// Text of the first choice, if any.
    pub fn first_message(&self) -> Option<&str> {
        self.choices.first()?.message.content.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("OpenAI request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<ChatError> for DemoError {
    fn from(err: ChatError) -> Self {
        DemoError::Chat(err.to_string())
    }
}

/// Extract the `error.message` field of an API error body.
pub fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(config: &ChatConfig) -> Self {
        Self::with_http(reqwest::Client::new(), config)
    }

    pub fn with_http(http: reqwest::Client, config: &ChatConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub async fn create_chat_completion(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletion, ChatError> {
        debug!(model = %request.model, "requesting chat completion");
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = api_error_message(&body)
                .unwrap_or_else(|| format!("OpenAI returned status {}", status.as_u16()));
            warn!(status = status.as_u16(), "chat completion rejected");
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

impl Summarizer for OpenAiClient {
    async fn summarize(
        &self,
        api_key: &str,
        request: &SummaryRequest,
    ) -> Result<Option<String>, DemoError> {
        let completion = self
            .create_chat_completion(api_key, &ChatCompletionRequest::from(request))
            .await?;
        Ok(completion.first_message().map(str::to_string))
    }
}
