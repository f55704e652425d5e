//! Tool trait and registry
//!
//! Tools are synchronous: the agent hands them decoded JSON arguments and
//! gets back the observation text. Anything asynchronous behind a tool goes
//! through the session's bridge.

use pilotcraft_core::ToolDefinition;
use pilotcraft_error::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;

pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. Domain failures come back as `Ok` text for the model;
    /// `Err` is reserved for bad arguments and infrastructure failures.
    fn call(&self, args: &Value) -> Result<String>;
}

/// Tools by name, listed in registration order
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any earlier tool with the same name
    pub fn register(&mut self, tool: impl Tool + 'static) -> &mut Self {
        let name = tool.definition().name;
        match self.index.get(&name) {
            Some(&i) => self.tools[i] = Box::new(tool),
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(Box::new(tool));
            }
        }
        self
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.definition().name).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn call(&self, name: &str, args: &Value) -> Result<String> {
        let tool = self.get(name).ok_or_else(|| Error::tool_not_found(name))?;
        tool.call(args)
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Required numeric argument. Numeric strings are accepted since small
/// models quote numbers often.
pub fn number_arg(args: &Value, name: &str) -> Result<f64> {
    optional_number_arg(args, name)?
        .ok_or_else(|| Error::invalid_argument(format!("missing argument '{}'", name)).with_context("argument", name))
}

pub fn optional_number_arg(args: &Value, name: &str) -> Result<Option<f64>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| not_a_number(name, s)),
        Some(other) => Err(not_a_number(name, &other.to_string())),
    }
}

pub fn string_arg(args: &Value, name: &str) -> Result<String> {
    optional_string_arg(args, name)?
        .ok_or_else(|| Error::invalid_argument(format!("missing argument '{}'", name)).with_context("argument", name))
}

pub fn optional_string_arg(args: &Value, name: &str) -> Result<Option<String>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::invalid_argument(format!(
            "argument '{}' must be a string, got {}",
            name, other
        ))
        .with_context("argument", name)),
    }
}

fn not_a_number(name: &str, value: &str) -> Error {
    Error::invalid_argument(format!("argument '{}' must be a number, got {}", name, value))
        .with_context("argument", name)
}
