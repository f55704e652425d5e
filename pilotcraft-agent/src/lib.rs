//! # pilotcraft agent
//!
//! The agent drives one instruction at a time:
//! 1. The user types a command
//! 2. The model answers with tool calls, or with a `<code>` block of calls
//! 3. Each call runs through the session's tool registry
//! 4. Tool output goes back to the model as an observation
//! 5. Repeat until the model answers in plain text or the step budget runs out
//!
//! Drone tools block on the session bridge; turtle tools draw directly.

mod agent;
pub mod code_action;
pub mod prompts;
pub mod session;
pub mod tool;
pub mod tools;

pub use agent::{Agent, AgentConfig, AgentOutcome, Observation};
pub use session::{DroneSession, TurtleSession};
pub use tool::{Tool, ToolRegistry};
