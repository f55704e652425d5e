//! Built-in tool sets

pub mod drone;
pub mod turtle;

use crate::tool::ToolRegistry;
use drone::DroneHandle;
use turtle::SharedCanvas;

/// Drone tools in the order the model sees them
pub fn drone_tools(handle: &DroneHandle) -> ToolRegistry {
    ToolRegistry::new()
        .with(drone::ConnectToDrone(handle.clone()))
        .with(drone::ArmAndTakeoff(handle.clone()))
        .with(drone::LandDrone(handle.clone()))
        .with(drone::GetDroneTelemetry(handle.clone()))
        .with(drone::GotoLocation(handle.clone()))
        .with(drone::OrbitLocation(handle.clone()))
        .with(drone::ReturnToLaunch(handle.clone()))
        .with(drone::DisarmDrone(handle.clone()))
}

pub fn turtle_tools(canvas: &SharedCanvas) -> ToolRegistry {
    ToolRegistry::new()
        .with(turtle::MoveForward(canvas.clone()))
        .with(turtle::Turn(canvas.clone()))
        .with(turtle::DrawCircle(canvas.clone()))
        .with(turtle::ChangePenColor(canvas.clone()))
        .with(turtle::PenUp(canvas.clone()))
        .with(turtle::PenDown(canvas.clone()))
}
