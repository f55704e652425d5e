//! # pilotcraft core
//!
//! The pieces an agent session is assembled from.
//!
//! ## Core Concepts
//! - **Bridge**: a background thread owning a tokio runtime; synchronous
//!   callers submit futures and block for the result, strictly in order
//! - **Vehicle**: the `VehicleBackend` protocol seam, an in-process
//!   simulator, and the guarded `DroneController`
//! - **Canvas**: a turtle-graphics pen surface with SVG output
//! - **Provider**: trait-based LLM communication (OpenAI-compatible, Ollama)

pub mod bridge;
pub mod canvas;
pub mod provider;
pub mod vehicle;

pub use bridge::{Bridge, BridgeConfig};
pub use canvas::{Color, Point, Segment, TurtleCanvas};
pub use pilotcraft_error::{Error, ErrorKind, ErrorStatus, Result};
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, OpenAIProvider,
    ProviderConfig, ProviderError, Role, ToolCall, ToolDefinition, Usage, UsageTracker,
};
pub use vehicle::{
    DroneConfig, DroneController, OrbitYawBehavior, SimConfig, SimulatedVehicle, SystemAddress,
    Telemetry, VehicleBackend, VehicleCommand,
};
