//! Agent implementation - orchestrates the LLM <-> tool loop

use crate::code_action::{parse_code_action, ParsedCall};
use crate::prompts;
use crate::tool::ToolRegistry;
use pilotcraft_core::{ChatMessage, CompletionRequest, LlmProvider, ToolCall, UsageTracker};
use pilotcraft_error::{Error, ErrorKind, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Configuration for the agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// System message
    pub system_prompt: String,
    /// Session instructions placed before each user command
    pub instructions: String,
    /// Model round trips per instruction
    pub max_steps: usize,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: prompts::SYSTEM_PROMPT.to_string(),
            instructions: String::new(),
            max_steps: 1,
            model: None,
            temperature: None,
        }
    }
}

impl AgentConfig {
    pub fn drone() -> Self {
        Self {
            instructions: prompts::DRONE_INSTRUCTIONS.to_string(),
            ..Self::default()
        }
    }

    /// Multi-step missions: the model keeps calling tools until it answers
    pub fn mission() -> Self {
        Self {
            instructions: prompts::MISSION_INSTRUCTIONS.to_string(),
            max_steps: 10,
            ..Self::default()
        }
    }

    pub fn turtle() -> Self {
        Self {
            instructions: prompts::TURTLE_INSTRUCTIONS.to_string(),
            ..Self::default()
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// One executed tool call
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub tool: String,
    pub arguments: Value,
    pub output: String,
}

/// Result of one instruction
#[derive(Debug, Clone, Default)]
pub struct AgentOutcome {
    pub observations: Vec<Observation>,
    pub final_answer: Option<String>,
    /// Model round trips used
    pub steps: usize,
}

impl AgentOutcome {
    /// Text to show the user: the final answer, or the last tool output
    pub fn summary(&self) -> Option<&str> {
        self.final_answer
            .as_deref()
            .or_else(|| self.observations.last().map(|o| o.output.as_str()))
    }
}

/// The agent orchestrator
pub struct Agent<P> {
    provider: P,
    config: AgentConfig,
    usage: UsageTracker,
}

impl<P: LlmProvider> Agent<P> {
    pub fn new(provider: P, config: AgentConfig) -> Self {
        Self {
            provider,
            config,
            usage: UsageTracker::new(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Run one instruction against `tools`.
    ///
    /// Tool failures reach the model as observations; provider and bridge
    /// failures are returned.
    pub async fn run(&mut self, tools: &ToolRegistry, command: &str) -> Result<AgentOutcome> {
        info!(command, "running instruction");

        let mut messages = vec![
            ChatMessage::system(&self.config.system_prompt),
            ChatMessage::user(prompts::user_message(&self.config.instructions, command)),
        ];
        let definitions = tools.definitions();
        let mut outcome = AgentOutcome::default();

        for step in 1..=self.config.max_steps.max(1) {
            let mut request = CompletionRequest::new(messages.clone());
            if !definitions.is_empty() {
                request = request.with_tools(definitions.clone());
            }
            if let Some(model) = &self.config.model {
                request = request.with_model(model);
            }
            if let Some(temperature) = self.config.temperature {
                request = request.with_temperature(temperature);
            }

            let response = self
                .provider
                .complete(request)
                .await
                .map_err(|e| Error::from(e).with_context("step", step.to_string()))?;
            self.usage.track(&response.usage);
            outcome.steps = step;
            debug!(
                step,
                tool_calls = response.tool_calls.len(),
                finish_reason = ?response.finish_reason,
                "model responded"
            );

            if !response.tool_calls.is_empty() {
                messages.push(ChatMessage::assistant_tool_calls(
                    response.content.clone(),
                    response.tool_calls.clone(),
                ));
                for call in &response.tool_calls {
                    let observation = self.execute_tool_call(tools, call)?;
                    messages.push(ChatMessage::tool_result(&call.id, &observation.output));
                    outcome.observations.push(observation);
                }
                continue;
            }

            let content = response.content.unwrap_or_default();
            let Some(parsed) = parse_code_action(&content) else {
                outcome.final_answer = Some(content.trim().to_string());
                break;
            };

            messages.push(ChatMessage::assistant(&content));
            let mut outputs = Vec::new();
            match parsed {
                Ok(calls) => {
                    for call in calls {
                        if call.name == "final_answer" {
                            outcome.final_answer = Some(final_answer_text(call));
                            continue;
                        }
                        let observation = self.execute_parsed_call(tools, call)?;
                        outputs.push(observation.output.clone());
                        outcome.observations.push(observation);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "could not parse code action");
                    outputs.push(format!("Error: {}", e.message()));
                }
            }

            if outcome.final_answer.is_some() {
                break;
            }
            messages.push(ChatMessage::user(format!("Observation:\n{}", outputs.join("\n"))));
        }

        info!(
            steps = outcome.steps,
            tool_calls = outcome.observations.len(),
            "instruction finished"
        );
        Ok(outcome)
    }

    fn execute_tool_call(&self, tools: &ToolRegistry, call: &ToolCall) -> Result<Observation> {
        match call.parse_arguments::<Value>() {
            Ok(arguments) => dispatch(tools, &call.name, arguments),
            Err(e) => Ok(Observation {
                tool: call.name.clone(),
                arguments: Value::String(call.arguments.clone()),
                output: format!("Error: invalid arguments for {}: {}", call.name, e),
            }),
        }
    }

    fn execute_parsed_call(&self, tools: &ToolRegistry, call: ParsedCall) -> Result<Observation> {
        let name = call.name.clone();
        let Some(tool) = tools.get(&name) else {
            return dispatch(tools, &name, Value::Object(Default::default()));
        };
        let parameters = tool.definition().parameter_names();
        match call.into_arguments(&parameters) {
            Ok(arguments) => dispatch(tools, &name, arguments),
            Err(e) => Ok(Observation {
                tool: name,
                arguments: Value::Null,
                output: format!("Error: {}", e.message()),
            }),
        }
    }
}

/// Run a tool; argument and lookup problems become the observation text
fn dispatch(tools: &ToolRegistry, name: &str, arguments: Value) -> Result<Observation> {
    info!(tool = name, %arguments, "calling tool");
    let output = match tools.call(name, &arguments) {
        Ok(output) => output,
        Err(e) if is_reportable(&e) => {
            warn!(tool = name, error = %e, "tool call rejected");
            format!("Error: {}", e.message())
        }
        Err(e) => return Err(e),
    };
    debug!(tool = name, %output, "tool returned");
    Ok(Observation {
        tool: name.to_string(),
        arguments,
        output,
    })
}

fn is_reportable(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ToolNotFound | ErrorKind::InvalidArgument | ErrorKind::ParseFailed | ErrorKind::InvalidColor
    )
}

fn final_answer_text(call: ParsedCall) -> String {
    let value = call
        .positional
        .into_iter()
        .next()
        .or_else(|| call.keyword.into_iter().next().map(|(_, v)| v))
        .unwrap_or(Value::Null);
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::Tool;
    use pilotcraft_core::{
        CompletionResponse, FinishReason, ProviderError, ToolDefinition, Usage,
    };
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<CompletionResponse>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<CompletionResponse>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl LlmProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn default_model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: CompletionRequest) -> std::result::Result<CompletionResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ProviderError::Other("script exhausted".into()))
        }
    }

    fn text(content: &str) -> CompletionResponse {
        CompletionResponse {
            id: String::new(),
            model: "scripted".into(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
        }
    }

    fn tool_call(name: &str, arguments: &str) -> CompletionResponse {
        CompletionResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_0".into(),
                name: name.into(),
                arguments: arguments.into(),
            }],
            finish_reason: FinishReason::ToolCalls,
            ..text("")
        }
    }

    struct Add;

    impl Tool for Add {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("add", "Adds two numbers").with_parameters(json!({
                "type": "object",
                "properties": { "a": { "type": "number" }, "b": { "type": "number" } },
                "required": ["a", "b"]
            }))
        }

        fn call(&self, args: &Value) -> Result<String> {
            let a = crate::tool::number_arg(args, "a")?;
            let b = crate::tool::number_arg(args, "b")?;
            Ok(format!("{}", a + b))
        }
    }

    fn tools() -> ToolRegistry {
        ToolRegistry::new().with(Add)
    }

    #[tokio::test]
    async fn test_structured_tool_call() {
        let provider = Scripted::new(vec![tool_call("add", r#"{"a": 2, "b": 3}"#)]);
        let mut agent = Agent::new(provider, AgentConfig::default());
        let outcome = agent.run(&tools(), "add 2 and 3").await.unwrap();

        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.observations[0].output, "5");
        assert_eq!(outcome.summary(), Some("5"));
        assert_eq!(agent.usage().total_calls, 1);

        let requests = agent.provider().requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.messages[1].content.as_deref(), Some("\n\nUser command: add 2 and 3"));
        assert_eq!(request.tools.as_ref().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_code_action_with_positional_args() {
        let provider = Scripted::new(vec![text("Thought: add them\n<code>\nprint(add(2, b=4.5))\n</code>")]);
        let mut agent = Agent::new(provider, AgentConfig::default());
        let outcome = agent.run(&tools(), "add").await.unwrap();

        assert_eq!(outcome.observations[0].arguments, json!({ "a": 2, "b": 4.5 }));
        assert_eq!(outcome.observations[0].output, "6.5");
        assert_eq!(outcome.final_answer, None);
    }

    #[tokio::test]
    async fn test_bad_calls_become_observations() {
        let provider = Scripted::new(vec![text(
            "<code>\nsubtract(1, 2)\nadd(1)\nadd(1, 2, 3)\n</code>",
        )]);
        let mut agent = Agent::new(provider, AgentConfig::default());
        let outcome = agent.run(&tools(), "oops").await.unwrap();

        let outputs: Vec<&str> = outcome.observations.iter().map(|o| o.output.as_str()).collect();
        assert_eq!(
            outputs,
            vec![
                "Error: unknown tool 'subtract'",
                "Error: missing argument 'b'",
                "Error: add() takes 2 arguments but 3 were given",
            ]
        );
    }

    #[tokio::test]
    async fn test_multi_step_until_final_answer() {
        let provider = Scripted::new(vec![
            tool_call("add", r#"{"a": 1, "b": 1}"#),
            text("<code>\nfinal_answer(\"two\")\n</code>"),
            text("never requested"),
        ]);
        let mut agent = Agent::new(provider, AgentConfig::default().with_max_steps(5));
        let outcome = agent.run(&tools(), "add").await.unwrap();

        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.final_answer.as_deref(), Some("two"));

        let requests = agent.provider().requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let second = &requests[1].messages;
        assert_eq!(second[2].tool_calls.as_ref().map(Vec::len), Some(1));
        assert_eq!(second[3].tool_call_id.as_deref(), Some("call_0"));
        assert_eq!(second[3].content.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_plain_text_is_final() {
        let provider = Scripted::new(vec![text("  Nothing to do.  ")]);
        let mut agent = Agent::new(provider, AgentConfig::default().with_max_steps(3));
        let outcome = agent.run(&tools(), "hi").await.unwrap();
        assert_eq!(outcome.final_answer.as_deref(), Some("Nothing to do."));
        assert!(outcome.observations.is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let provider = Scripted::new(vec![]);
        let mut agent = Agent::new(provider, AgentConfig::default());
        let err = agent.run(&tools(), "hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InferenceFailed);
    }
}
