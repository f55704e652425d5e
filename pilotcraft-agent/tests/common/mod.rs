//! Shared fixtures for the session tests

use pilotcraft_core::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, ProviderError, ToolCall, Usage,
};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays canned model replies in order
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<CompletionResponse>>,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = CompletionResponse>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: CompletionRequest) -> std::result::Result<CompletionResponse, ProviderError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::Other("script exhausted".into()))
    }
}

pub fn code(line: &str) -> CompletionResponse {
    CompletionResponse {
        id: String::new(),
        model: "scripted".into(),
        content: Some(format!("Thought: calling the tool.\n<code>\n{}\n</code>", line)),
        tool_calls: Vec::new(),
        finish_reason: FinishReason::Stop,
        usage: Usage::default(),
    }
}

#[allow(dead_code)]
pub fn call(name: &str) -> CompletionResponse {
    CompletionResponse {
        content: None,
        tool_calls: vec![ToolCall {
            id: format!("call_{}", name),
            name: name.into(),
            arguments: "{}".into(),
        }],
        finish_reason: FinishReason::ToolCalls,
        ..code("")
    }
}

/// A plain-text reply
#[allow(dead_code)]
pub fn answer(text: &str) -> CompletionResponse {
    CompletionResponse {
        content: Some(text.into()),
        ..code("")
    }
}
