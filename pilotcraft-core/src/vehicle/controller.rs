//! Guarded drone controller
//!
//! Owns the single vehicle handle and the `connected` flag. Every command
//! other than `connect` checks the flag first and returns `Ok(false)`
//! without touching the backend when the drone is not connected.

use super::{OrbitYawBehavior, SystemAddress, VehicleBackend};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use pilotcraft_error::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Controller settings
#[derive(Debug, Clone)]
pub struct DroneConfig {
    pub address: SystemAddress,
    /// How long `takeoff` waits after the command for the climb to finish
    pub takeoff_settle: Duration,
    /// Applied right after connecting when set
    pub takeoff_altitude_m: Option<f32>,
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            address: SystemAddress::default(),
            takeoff_settle: Duration::from_secs(5),
            takeoff_altitude_m: None,
        }
    }
}

impl DroneConfig {
    pub fn with_address(mut self, address: SystemAddress) -> Self {
        self.address = address;
        self
    }

    pub fn with_takeoff_settle(mut self, settle: Duration) -> Self {
        self.takeoff_settle = settle;
        self
    }

    pub fn with_takeoff_altitude(mut self, altitude_m: f32) -> Self {
        self.takeoff_altitude_m = Some(altitude_m);
        self
    }
}

/// One telemetry snapshot, read fresh on every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub absolute_altitude_m: f32,
    pub relative_altitude_m: f32,
    pub heading_deg: f64,
    pub is_armed: bool,
    pub is_in_air: bool,
}

pub struct DroneController {
    backend: Arc<dyn VehicleBackend>,
    config: DroneConfig,
    connected: AtomicBool,
}

impl DroneController {
    pub fn new(backend: Arc<dyn VehicleBackend>, config: DroneConfig) -> Self {
        Self {
            backend,
            config,
            connected: AtomicBool::new(false),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &DroneConfig {
        &self.config
    }

    /// Connect and wait for the first "connected" event.
    ///
    /// Returns `Ok(false)` when the state stream ends before the vehicle
    /// reports a connection.
    pub async fn connect(&self) -> Result<bool> {
        info!(address = %self.config.address, "connecting to drone");
        let mut states = self
            .backend
            .connect(&self.config.address)
            .await
            .map_err(|e| e.with_operation("drone::connect"))?;

        while let Some(state) = states.next().await {
            if state.is_connected {
                if let Some(altitude) = self.config.takeoff_altitude_m {
                    self.backend
                        .set_takeoff_altitude(altitude)
                        .await
                        .map_err(|e| e.with_operation("drone::connect"))?;
                }
                self.connected.store(true, Ordering::SeqCst);
                info!("drone connected");
                return Ok(true);
            }
        }

        warn!("connection state stream ended before the drone connected");
        Ok(false)
    }

    fn guard(&self, command: &str) -> bool {
        if self.is_connected() {
            true
        } else {
            warn!(command, "drone not connected, refusing command");
            false
        }
    }

    pub async fn arm(&self) -> Result<bool> {
        if !self.guard("arm") {
            return Ok(false);
        }
        info!("arming drone");
        self.backend.arm().await.map_err(|e| e.with_operation("drone::arm"))?;
        Ok(true)
    }

    pub async fn disarm(&self) -> Result<bool> {
        if !self.guard("disarm") {
            return Ok(false);
        }
        info!("disarming drone");
        self.backend.disarm().await.map_err(|e| e.with_operation("drone::disarm"))?;
        Ok(true)
    }

    /// Take off to the configured altitude and wait for the climb
    pub async fn takeoff(&self) -> Result<bool> {
        if !self.guard("take off") {
            return Ok(false);
        }
        info!("taking off");
        self.backend.takeoff().await.map_err(|e| e.with_operation("drone::takeoff"))?;
        if !self.config.takeoff_settle.is_zero() {
            tokio::time::sleep(self.config.takeoff_settle).await;
        }
        Ok(true)
    }

    pub async fn land(&self) -> Result<bool> {
        if !self.guard("land") {
            return Ok(false);
        }
        info!("landing");
        self.backend.land().await.map_err(|e| e.with_operation("drone::land"))?;
        Ok(true)
    }

    pub async fn return_to_launch(&self) -> Result<bool> {
        if !self.guard("return to launch") {
            return Ok(false);
        }
        info!("returning to launch");
        self.backend
            .return_to_launch()
            .await
            .map_err(|e| e.with_operation("drone::return_to_launch"))?;
        Ok(true)
    }

    pub async fn goto_location(
        &self,
        latitude_deg: f64,
        longitude_deg: f64,
        altitude_m: f32,
        yaw_deg: f32,
    ) -> Result<bool> {
        if !self.guard("go to location") {
            return Ok(false);
        }
        info!(latitude_deg, longitude_deg, altitude_m, "flying to location");
        self.backend
            .goto_location(latitude_deg, longitude_deg, altitude_m, yaw_deg)
            .await
            .map_err(|e| e.with_operation("drone::goto_location"))?;
        Ok(true)
    }

    pub async fn do_orbit(
        &self,
        radius_m: f32,
        velocity_ms: f32,
        yaw_behavior: OrbitYawBehavior,
        latitude_deg: f64,
        longitude_deg: f64,
        absolute_altitude_m: f64,
    ) -> Result<bool> {
        if !self.guard("orbit") {
            return Ok(false);
        }
        info!(radius_m, velocity_ms, %yaw_behavior, "starting orbit");
        self.backend
            .do_orbit(
                radius_m,
                velocity_ms,
                yaw_behavior,
                latitude_deg,
                longitude_deg,
                absolute_altitude_m,
            )
            .await
            .map_err(|e| e.with_operation("drone::do_orbit"))?;
        Ok(true)
    }

    /// Read one sample from each telemetry stream.
    ///
    /// `NotConnected` before a connection, `TelemetryUnavailable` when the
    /// backend fails, `TelemetryNotReady` when a stream has nothing yet.
    pub async fn telemetry(&self) -> Result<Telemetry> {
        if !self.is_connected() {
            return Err(Error::not_connected("get telemetry").with_operation("drone::telemetry"));
        }

        let position = first_sample(self.backend.position(), "position").await?;
        let heading = first_sample(self.backend.heading(), "heading").await?;
        let is_armed = first_sample(self.backend.armed(), "armed").await?;
        let is_in_air = first_sample(self.backend.in_air(), "in_air").await?;

        Ok(Telemetry {
            latitude_deg: position.latitude_deg,
            longitude_deg: position.longitude_deg,
            absolute_altitude_m: position.absolute_altitude_m,
            relative_altitude_m: position.relative_altitude_m,
            heading_deg: heading.heading_deg,
            is_armed,
            is_in_air,
        })
    }
}

async fn first_sample<T>(mut stream: BoxStream<'static, Result<T>>, name: &'static str) -> Result<T> {
    match stream.next().await {
        Some(Ok(sample)) => Ok(sample),
        Some(Err(err)) => Err(Error::new(
            ErrorKind::TelemetryUnavailable,
            format!("{} stream failed: {}", name, err.message()),
        )
        .with_operation("drone::telemetry")
        .with_context("stream", name)
        .set_source(err)),
        None => Err(Error::new(
            ErrorKind::TelemetryNotReady,
            format!("{} stream ended before the first sample", name),
        )
        .with_operation("drone::telemetry")
        .with_context("stream", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::{SimConfig, SimulatedVehicle, VehicleCommand};

    fn controller(config: SimConfig) -> (SimulatedVehicle, DroneController) {
        let sim = SimulatedVehicle::new(config);
        let drone = DroneController::new(
            Arc::new(sim.clone()),
            DroneConfig::default().with_takeoff_settle(Duration::ZERO),
        );
        (sim, drone)
    }

    #[test]
    fn test_commands_refused_before_connect() {
        let (sim, drone) = controller(SimConfig::instant());
        tokio_test::block_on(async {
            assert!(!drone.arm().await.unwrap());
            assert!(!drone.takeoff().await.unwrap());
            assert!(!drone.land().await.unwrap());
            assert!(!drone.return_to_launch().await.unwrap());
            assert!(!drone.goto_location(47.0, 8.0, 500.0, 0.0).await.unwrap());
            assert!(!drone
                .do_orbit(10.0, 2.0, OrbitYawBehavior::default(), f64::NAN, f64::NAN, f64::NAN)
                .await
                .unwrap());
        });
        assert!(sim.journal().is_empty());
    }

    #[tokio::test]
    async fn test_connect_then_fly() {
        let (sim, drone) = controller(SimConfig::instant());
        assert!(drone.connect().await.unwrap());
        assert!(drone.is_connected());
        assert!(drone.arm().await.unwrap());
        assert!(drone.takeoff().await.unwrap());
        assert!(drone.land().await.unwrap());

        assert_eq!(
            sim.journal()[1..],
            [VehicleCommand::Arm, VehicleCommand::Takeoff, VehicleCommand::Land]
        );
    }

    #[tokio::test]
    async fn test_connect_unreachable_propagates() {
        let (_, drone) = controller(SimConfig::instant().unreachable());
        let err = drone.connect().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VehicleUnreachable);
        assert_eq!(err.operation(), "drone::connect");
        assert!(!drone.is_connected());
    }

    #[tokio::test]
    async fn test_takeoff_altitude_applied_on_connect() {
        let sim = SimulatedVehicle::new(SimConfig::instant());
        let drone = DroneController::new(
            Arc::new(sim.clone()),
            DroneConfig::default()
                .with_takeoff_settle(Duration::ZERO)
                .with_takeoff_altitude(12.0),
        );
        drone.connect().await.unwrap();
        drone.arm().await.unwrap();
        drone.takeoff().await.unwrap();
        assert_eq!(sim.current_position().relative_altitude_m, 12.0);
    }

    #[tokio::test]
    async fn test_rejected_takeoff_altitude_leaves_drone_disconnected() {
        let sim = SimulatedVehicle::new(SimConfig::instant());
        let drone = DroneController::new(
            Arc::new(sim.clone()),
            DroneConfig::default()
                .with_takeoff_settle(Duration::ZERO)
                .with_takeoff_altitude(-5.0),
        );

        let err = drone.connect().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandRejected);
        assert_eq!(err.operation(), "drone::connect");
        assert!(!drone.is_connected());

        assert!(!drone.arm().await.unwrap());
        assert!(!sim.journal().contains(&VehicleCommand::Arm));
    }

    #[tokio::test]
    async fn test_telemetry_error_kinds() {
        let (_, drone) = controller(SimConfig::instant());
        assert_eq!(drone.telemetry().await.unwrap_err().kind(), ErrorKind::NotConnected);

        drone.connect().await.unwrap();
        let telemetry = drone.telemetry().await.unwrap();
        assert_eq!(telemetry.latitude_deg, 47.397742);
        assert!(!telemetry.is_in_air);

        let (_, silent) = controller(SimConfig::instant().without_telemetry());
        silent.connect().await.unwrap();
        assert_eq!(silent.telemetry().await.unwrap_err().kind(), ErrorKind::TelemetryNotReady);
    }
}
