//! Drone tools
//!
//! Each tool submits its controller call to the session bridge and blocks
//! for the answer. Vehicle failures become text for the model; only a
//! closed or panicked bridge is returned as an error.

use crate::tool::{number_arg, optional_number_arg, optional_string_arg, Tool};
use pilotcraft_core::{Bridge, DroneController, OrbitYawBehavior, ToolDefinition};
use pilotcraft_error::{Error, ErrorKind, Result};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// What every drone tool holds: the bridge and the controller it drives
#[derive(Clone)]
pub struct DroneHandle {
    bridge: Arc<Bridge>,
    drone: Arc<DroneController>,
}

impl DroneHandle {
    pub fn new(bridge: Arc<Bridge>, drone: Arc<DroneController>) -> Self {
        Self { bridge, drone }
    }

    /// Run `f(controller)` on the bridge. The outer `Result` carries bridge
    /// failures that must propagate; the inner one is the vehicle's answer.
    fn run<F, Fut, T>(&self, f: F) -> Result<Result<T>>
    where
        F: FnOnce(Arc<DroneController>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        match self.bridge.run(f(Arc::clone(&self.drone))) {
            Err(e) if is_bridge_failure(&e) => Err(e),
            other => Ok(other),
        }
    }
}

fn is_bridge_failure(err: &Error) -> bool {
    matches!(err.kind(), ErrorKind::BridgeClosed | ErrorKind::BridgePanicked)
}

fn no_parameters() -> Value {
    json!({ "type": "object", "properties": {}, "required": [] })
}

pub struct ConnectToDrone(pub DroneHandle);

impl Tool for ConnectToDrone {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("connect_to_drone", "Connects to the drone simulator. Call this first.")
            .with_parameters(no_parameters())
    }

    fn call(&self, _args: &Value) -> Result<String> {
        Ok(match self.0.run(|drone| async move { drone.connect().await })? {
            Ok(true) => "Successfully connected to the drone.".to_string(),
            Ok(false) => "Failed to connect to the drone.".to_string(),
            Err(e) => format!("Failed to connect to the drone: {}", e.message()),
        })
    }
}

pub struct ArmAndTakeoff(pub DroneHandle);

impl Tool for ArmAndTakeoff {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "arm_and_takeoff",
            "Arms the drone and then immediately commands it to take off. This is the standard procedure.",
        )
        .with_parameters(no_parameters())
    }

    fn call(&self, _args: &Value) -> Result<String> {
        info!("arming and taking off");

        match self.0.run(|drone| async move { drone.arm().await })? {
            Ok(true) => {}
            Ok(false) => return Ok("Arming failed. Cannot take off.".to_string()),
            Err(e) => return Ok(format!("Arming failed. Cannot take off. Reason: {}", e.message())),
        }

        Ok(match self.0.run(|drone| async move { drone.takeoff().await })? {
            Ok(true) => "Takeoff sequence initiated successfully.".to_string(),
            Ok(false) => "Takeoff failed after arming.".to_string(),
            Err(e) => format!("Takeoff failed after arming: {}", e.message()),
        })
    }
}

pub struct LandDrone(pub DroneHandle);

impl Tool for LandDrone {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("land_drone", "Commands the drone to land.").with_parameters(no_parameters())
    }

    fn call(&self, _args: &Value) -> Result<String> {
        Ok(match self.0.run(|drone| async move { drone.land().await })? {
            Ok(true) => "Landing initiated.".to_string(),
            Ok(false) => "Landing failed. Is the drone connected?".to_string(),
            Err(e) => format!("Landing failed: {}", e.message()),
        })
    }
}

pub struct DisarmDrone(pub DroneHandle);

impl Tool for DisarmDrone {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("disarm_drone", "Disarms the motors. Only possible on the ground.")
            .with_parameters(no_parameters())
    }

    fn call(&self, _args: &Value) -> Result<String> {
        Ok(match self.0.run(|drone| async move { drone.disarm().await })? {
            Ok(true) => "Drone disarmed.".to_string(),
            Ok(false) => "Disarming failed. Is the drone connected?".to_string(),
            Err(e) => format!("Disarming failed: {}", e.message()),
        })
    }
}

pub struct ReturnToLaunch(pub DroneHandle);

impl Tool for ReturnToLaunch {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "return_to_launch",
            "Flies the drone back to where it took off and lands it there.",
        )
        .with_parameters(no_parameters())
    }

    fn call(&self, _args: &Value) -> Result<String> {
        Ok(match self.0.run(|drone| async move { drone.return_to_launch().await })? {
            Ok(true) => "Returning to launch.".to_string(),
            Ok(false) => "Return to launch failed. Is the drone connected?".to_string(),
            Err(e) => format!("Return to launch failed: {}", e.message()),
        })
    }
}

pub struct GetDroneTelemetry(pub DroneHandle);

impl Tool for GetDroneTelemetry {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_drone_telemetry",
            "Gets the current position, altitude, and heading of the drone.",
        )
        .with_parameters(no_parameters())
    }

    fn call(&self, _args: &Value) -> Result<String> {
        match self.0.run(|drone| async move { drone.telemetry().await })? {
            Ok(telemetry) => serde_json::to_string(&telemetry)
                .map_err(|e| Error::unexpected("failed to encode telemetry").set_source(e)),
            Err(e) => Ok(format!("Could not retrieve telemetry: {}", e.message())),
        }
    }
}

pub struct GotoLocation(pub DroneHandle);

impl Tool for GotoLocation {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("goto_location", "Commands the drone to fly to a specific GPS location.")
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "latitude_deg": { "type": "number", "description": "Target latitude." },
                    "longitude_deg": { "type": "number", "description": "Target longitude." },
                    "altitude_m": { "type": "number", "description": "Target altitude in meters above mean sea level." },
                    "yaw_deg": { "type": "number", "description": "Target yaw angle in degrees. Omit to keep the current heading." }
                },
                "required": ["latitude_deg", "longitude_deg", "altitude_m"]
            }))
    }

    fn call(&self, args: &Value) -> Result<String> {
        let latitude = number_arg(args, "latitude_deg")?;
        let longitude = number_arg(args, "longitude_deg")?;
        let altitude = number_arg(args, "altitude_m")? as f32;
        let yaw = optional_number_arg(args, "yaw_deg")?.map_or(f32::NAN, |y| y as f32);

        Ok(
            match self
                .0
                .run(move |drone| async move { drone.goto_location(latitude, longitude, altitude, yaw).await })?
            {
                Ok(true) => format!("Flying to {}, {} at {}m.", latitude, longitude, altitude),
                Ok(false) => "Cannot go to location. Is the drone connected?".to_string(),
                Err(e) => format!("Go-to failed: {}", e.message()),
            },
        )
    }
}

pub struct OrbitLocation(pub DroneHandle);

impl Tool for OrbitLocation {
    fn definition(&self) -> ToolDefinition {
        let behaviors: Vec<&str> = OrbitYawBehavior::ALL.iter().map(|b| b.as_str()).collect();
        ToolDefinition::new(
            "orbit_location",
            "Flies the drone in a circle around a point. Omit the center to orbit the current position.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "radius_m": { "type": "number", "description": "Orbit radius in meters." },
                "velocity_ms": { "type": "number", "description": "Tangential speed in meters per second." },
                "latitude_deg": { "type": "number", "description": "Center latitude." },
                "longitude_deg": { "type": "number", "description": "Center longitude." },
                "absolute_altitude_m": { "type": "number", "description": "Orbit altitude above mean sea level." },
                "yaw_behavior": { "type": "string", "enum": behaviors }
            },
            "required": ["radius_m", "velocity_ms"]
        }))
    }

    fn call(&self, args: &Value) -> Result<String> {
        let radius = number_arg(args, "radius_m")? as f32;
        let velocity = number_arg(args, "velocity_ms")? as f32;
        let latitude = optional_number_arg(args, "latitude_deg")?.unwrap_or(f64::NAN);
        let longitude = optional_number_arg(args, "longitude_deg")?.unwrap_or(f64::NAN);
        let altitude = optional_number_arg(args, "absolute_altitude_m")?.unwrap_or(f64::NAN);
        let yaw_behavior = match optional_string_arg(args, "yaw_behavior")? {
            Some(s) => s.parse::<OrbitYawBehavior>()?,
            None => OrbitYawBehavior::default(),
        };

        Ok(
            match self.0.run(move |drone| async move {
                drone
                    .do_orbit(radius, velocity, yaw_behavior, latitude, longitude, altitude)
                    .await
            })? {
                Ok(true) => format!("Orbiting with a radius of {}m at {}m/s.", radius, velocity),
                Ok(false) => "Cannot orbit. Is the drone connected?".to_string(),
                Err(e) => format!("Orbit failed: {}", e.message()),
            },
        )
    }
}
