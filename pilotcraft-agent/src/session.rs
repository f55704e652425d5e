//! Session context objects
//!
//! A session owns everything one interactive run needs. Dropping it
//! releases those resources; for the drone that means stopping the bridge
//! thread.

use crate::tool::ToolRegistry;
use crate::tools::drone::DroneHandle;
use crate::tools::turtle::SharedCanvas;
use crate::tools::{drone_tools, turtle_tools};
use pilotcraft_core::{Bridge, BridgeConfig, DroneConfig, DroneController, TurtleCanvas, VehicleBackend};
use pilotcraft_error::Result;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub struct DroneSession {
    bridge: Arc<Bridge>,
    drone: Arc<DroneController>,
    tools: ToolRegistry,
}

impl DroneSession {
    /// Start the bridge and wire the drone tools to `backend`
    pub fn new(backend: Arc<dyn VehicleBackend>, drone: DroneConfig, bridge: BridgeConfig) -> Result<Self> {
        let bridge = Arc::new(Bridge::new(bridge)?);
        let drone = Arc::new(DroneController::new(backend, drone));
        let tools = drone_tools(&DroneHandle::new(Arc::clone(&bridge), Arc::clone(&drone)));
        info!(address = %drone.config().address, tools = tools.len(), "drone session started");

        Ok(Self { bridge, drone, tools })
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn drone(&self) -> &Arc<DroneController> {
        &self.drone
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Stop the bridge. Later tool calls fail with `BridgeClosed`.
    pub fn close(&self) -> Result<()> {
        self.bridge.shutdown()
    }
}

impl Drop for DroneSession {
    fn drop(&mut self) {
        if let Err(e) = self.bridge.shutdown() {
            warn!(error = %e, "bridge shutdown failed");
        }
    }
}

pub struct TurtleSession {
    canvas: SharedCanvas,
    tools: ToolRegistry,
}

impl Default for TurtleSession {
    fn default() -> Self {
        Self::new(TurtleCanvas::default())
    }
}

impl TurtleSession {
    pub fn new(canvas: TurtleCanvas) -> Self {
        let canvas = Arc::new(Mutex::new(canvas));
        let tools = turtle_tools(&canvas);
        Self { canvas, tools }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Copy of the canvas as it is now
    pub fn snapshot(&self) -> TurtleCanvas {
        self.canvas.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn save_svg(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.snapshot().to_svg())
            .map_err(|e| pilotcraft_error::Error::from(e).with_context("path", path.display().to_string()))?;
        info!(path = %path.display(), "drawing saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilotcraft_core::{SimConfig, SimulatedVehicle};
    use pilotcraft_error::ErrorKind;
    use serde_json::json;
    use std::time::Duration;

    fn drone_session() -> DroneSession {
        DroneSession::new(
            Arc::new(SimulatedVehicle::new(SimConfig::instant())),
            DroneConfig::default().with_takeoff_settle(Duration::ZERO),
            BridgeConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_drone_tool_names() {
        let session = drone_session();
        assert_eq!(
            session.tools().names(),
            vec![
                "connect_to_drone",
                "arm_and_takeoff",
                "land_drone",
                "get_drone_telemetry",
                "goto_location",
                "orbit_location",
                "return_to_launch",
                "disarm_drone",
            ]
        );
    }

    #[test]
    fn test_close_is_idempotent_and_final() {
        let session = drone_session();
        session.close().unwrap();
        session.close().unwrap();
        assert!(!session.bridge().is_running());
        let err = session.tools().call("connect_to_drone", &json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BridgeClosed);
    }

    #[test]
    fn test_sessions_are_independent() {
        let first = drone_session();
        let second = drone_session();
        first.tools().call("connect_to_drone", &json!({})).unwrap();
        assert!(first.drone().is_connected());
        assert!(!second.drone().is_connected());
        drop(first);
        assert!(second.bridge().is_running());
    }

    #[test]
    fn test_turtle_session_svg() {
        let session = TurtleSession::default();
        session.tools().call("move_forward", &json!({ "distance": 10 })).unwrap();
        assert_eq!(session.snapshot().segments().len(), 1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drawing.svg");
        session.save_svg(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("<line"));

        let err = session.save_svg(dir.path().join("missing").join("x.svg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailed);
    }
}
