//! Chat-completions client
//!
//! Covers OpenAI itself, Ollama's `/v1`, vLLM and the like. Servers differ
//! in small ways (Ollama leaves out call ids and sends arguments as an
//! object), so decoding is lenient.

use super::*;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

pub struct OpenAIProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAIProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn build_request(&self, request: &CompletionRequest) -> wire::Request {
        wire::Request {
            model: request.model.clone().unwrap_or_else(|| self.config.default_model.clone()),
            messages: request.messages.iter().cloned().map(wire::Message::from).collect(),
            temperature: request.temperature,
            stream: false,
            tools: request
                .tools
                .as_ref()
                .map(|tools| tools.iter().map(wire::Tool::from).collect()),
        }
    }

    async fn send(&self, body: &wire::Request) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        debug!(%url, model = %body.model, messages = body.messages.len(), "requesting completion");

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| ProviderError::Network(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let text = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %text, "model server refused the request");

        Err(match status.as_u16() {
            429 => ProviderError::RateLimited { retry_after },
            401 => ProviderError::AuthenticationFailed,
            404 if text.contains("model") => ProviderError::ModelNotFound(body.model.clone()),
            400 => ProviderError::InvalidRequest(text),
            code => ProviderError::Api { status: code, message: text },
        })
    }
}

impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let body = self.build_request(&request);
        let reply: wire::Response = self
            .send(&body)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let mut response = into_completion(reply)?;
        if response.model.is_empty() {
            response.model = body.model;
        }
        Ok(response)
    }
}

fn into_completion(reply: wire::Response) -> Result<CompletionResponse, ProviderError> {
    let Some(choice) = reply.choices.into_iter().next() else {
        return Err(ProviderError::Parse("response has no choices".into()));
    };

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, call)| ToolCall {
            id: call.id.unwrap_or_else(|| format!("call_{}", i)),
            name: call.function.name,
            arguments: call.function.arguments.into_text(),
        })
        .collect();

    Ok(CompletionResponse {
        id: reply.id,
        model: reply.model,
        content: choice.message.content,
        tool_calls,
        finish_reason: FinishReason::parse(choice.finish_reason.as_deref()),
        usage: reply.usage.unwrap_or_default().into(),
    })
}

/// Request and response bodies as they travel over HTTP
mod wire {
    use super::super::{ChatMessage, ToolDefinition, Usage};
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    #[derive(Debug, Serialize)]
    pub struct Request {
        pub model: String,
        pub messages: Vec<Message>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub temperature: Option<f32>,
        pub stream: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub tools: Option<Vec<Tool>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Message {
        pub role: super::super::Role,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub tool_calls: Option<Vec<Call>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub tool_call_id: Option<String>,
    }

    impl From<ChatMessage> for Message {
        fn from(message: ChatMessage) -> Self {
            let tool_calls = message.tool_calls.map(|calls| {
                calls
                    .into_iter()
                    .map(|call| Call {
                        id: Some(call.id),
                        kind: Some("function".into()),
                        function: CallFunction {
                            name: call.name,
                            arguments: Arguments::Text(call.arguments),
                        },
                    })
                    .collect()
            });

            Self {
                role: message.role,
                content: message.content,
                tool_calls,
                tool_call_id: message.tool_call_id,
            }
        }
    }

    #[derive(Debug, Serialize)]
    pub struct Tool {
        #[serde(rename = "type")]
        pub kind: &'static str,
        pub function: ToolFunction,
    }

    #[derive(Debug, Serialize)]
    pub struct ToolFunction {
        pub name: String,
        pub description: String,
        pub parameters: Value,
    }

    impl From<&ToolDefinition> for Tool {
        fn from(tool: &ToolDefinition) -> Self {
            Self {
                kind: "function",
                function: ToolFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                },
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Call {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub id: Option<String>,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        pub kind: Option<String>,
        pub function: CallFunction,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CallFunction {
        pub name: String,
        #[serde(default)]
        pub arguments: Arguments,
    }

    /// A JSON string from OpenAI, a bare object from Ollama
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum Arguments {
        Text(String),
        Object(Value),
    }

    impl Default for Arguments {
        fn default() -> Self {
            Arguments::Text(String::new())
        }
    }

    impl Arguments {
        pub fn into_text(self) -> String {
            match self {
                Arguments::Text(text) => text,
                Arguments::Object(value) => value.to_string(),
            }
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct Response {
        #[serde(default)]
        pub id: String,
        #[serde(default)]
        pub model: String,
        pub choices: Vec<Choice>,
        pub usage: Option<TokenCounts>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Choice {
        pub message: Message,
        pub finish_reason: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct TokenCounts {
        pub prompt_tokens: usize,
        pub completion_tokens: usize,
        pub total_tokens: usize,
    }

    impl From<TokenCounts> for Usage {
        fn from(counts: TokenCounts) -> Self {
            Usage {
                prompt_tokens: counts.prompt_tokens,
                completion_tokens: counts.completion_tokens,
                total_tokens: counts.total_tokens,
            }
        }
    }
}
