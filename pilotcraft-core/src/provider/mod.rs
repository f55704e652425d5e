//! # Chat model providers
//!
//! `LlmProvider` is the seam between the agent and whatever model serves it.
//! The one implementation, [`OpenAIProvider`], talks to any endpoint that
//! speaks the chat-completions protocol; the defaults point at a local
//! Ollama.

pub mod openai;

pub use openai::OpenAIProvider;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";
pub const DEFAULT_MODEL: &str = "mistral";
/// Ollama ignores the key, but the protocol wants one
pub const DEFAULT_API_KEY: &str = "ollama";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// The assistant turn that asked for `calls`. It has to be in the
    /// history before the matching [`ChatMessage::tool_result`]s.
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            content,
            tool_calls: Some(calls),
            ..Self::text(Role::Assistant, "")
        }
    }

    pub fn tool_result(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::text(Role::Tool, output)
        }
    }
}

/// Name, description and JSON schema of something the model may call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    /// A tool without parameters until `with_parameters` says otherwise
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: json!({ "type": "object", "properties": {}, "required": [] }),
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Property names in the order the schema lists them
    pub fn parameter_names(&self) -> Vec<String> {
        match self.parameters.get("properties") {
            Some(Value::Object(properties)) => properties.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Arguments as the model sent them, a JSON object in text form
    pub arguments: String,
}

impl ToolCall {
    /// Blank arguments decode as `{}`
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let raw = self.arguments.trim();
        serde_json::from_str(if raw.is_empty() { "{}" } else { raw })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Falls back to the provider's default model
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub tools: Option<Vec<ToolDefinition>>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub id: String,
    pub model: String,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Unknown,
}

impl FinishReason {
    pub fn parse(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") => Self::Stop,
            Some("length") => Self::Length,
            Some("tool_calls") => Self::ToolCalls,
            Some("content_filter") => Self::ContentFilter,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug)]
pub enum ProviderError {
    /// The request never got an HTTP response
    Network(String),
    Api { status: u16, message: String },
    /// The response body was not what the protocol promises
    Parse(String),
    RateLimited { retry_after: Option<u64> },
    InvalidRequest(String),
    ModelNotFound(String),
    AuthenticationFailed,
    Other(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(e) => write!(f, "could not reach the model server: {}", e),
            Self::Api { status, message } => write!(f, "model server returned {}: {}", status, message),
            Self::Parse(e) => write!(f, "unreadable model response: {}", e),
            Self::RateLimited { retry_after: Some(secs) } => write!(f, "rate limited, retry after {}s", secs),
            Self::RateLimited { retry_after: None } => write!(f, "rate limited"),
            Self::InvalidRequest(e) => write!(f, "invalid request: {}", e),
            Self::ModelNotFound(model) => write!(f, "model '{}' is not available", model),
            Self::AuthenticationFailed => write!(f, "the model server rejected the API key"),
            Self::Other(e) => f.write_str(e),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<ProviderError> for pilotcraft_error::Error {
    fn from(err: ProviderError) -> Self {
        use pilotcraft_error::{Error, ErrorKind};

        let kind = match &err {
            ProviderError::Network(_) => ErrorKind::NetworkFailed,
            ProviderError::Api { status, .. } if *status >= 500 => ErrorKind::ProviderUnavailable,
            ProviderError::Api { .. } | ProviderError::Other(_) => ErrorKind::InferenceFailed,
            ProviderError::Parse(_) => ErrorKind::ParseFailed,
            ProviderError::RateLimited { .. } => ErrorKind::RateLimited,
            ProviderError::InvalidRequest(_) => ErrorKind::InvalidArgument,
            ProviderError::ModelNotFound(_) | ProviderError::AuthenticationFailed => ErrorKind::ConfigInvalid,
        };
        let mut error = Error::new(kind, err.to_string()).with_operation("provider::complete");
        if let ProviderError::Api { status, .. } = &err {
            error = error.with_context("status", status.to_string());
        }
        error.set_source(err)
    }
}

/// A chat model the agent can ask for the next step
#[allow(async_fn_in_trait)]
pub trait LlmProvider: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &str;

    /// Model used when a request names none
    fn default_model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;
}

/// Where the model lives and how to talk to it
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Includes the `/v1` prefix
    pub base_url: String,
    pub api_key: Option<String>,
    pub default_model: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::ollama(DEFAULT_BASE_URL)
    }
}

impl ProviderConfig {
    /// An Ollama server, or anything else at `base_url` that speaks the
    /// same protocol. `/v1` is appended when missing.
    pub fn ollama(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/');
        let base_url = if base_url.ends_with("/v1") {
            base_url.to_string()
        } else {
            format!("{}/v1", base_url)
        };

        Self {
            base_url,
            api_key: Some(DEFAULT_API_KEY.into()),
            default_model: DEFAULT_MODEL.into(),
            // local models can take minutes to load
            timeout_secs: 300,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// An empty key sends no `Authorization` header
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into()).filter(|key| !key.is_empty());
        self
    }
}

/// Running token totals for one agent
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    pub total_calls: usize,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, usage: &Usage) {
        self.total_calls += 1;
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
    }

    pub fn total_tokens(&self) -> usize {
        self.prompt_tokens + self.completion_tokens
    }
}
