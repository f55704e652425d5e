//! In-process simulated vehicle
//!
//! Kinematics are instantaneous: a command that is accepted moves the
//! vehicle straight to its end state. Arming rules follow PX4 closely
//! enough for the agent to get the same refusals it would get from SITL.

use super::{ConnectionState, Heading, OrbitYawBehavior, Position, SystemAddress, VehicleBackend};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use pilotcraft_error::{Error, ErrorKind, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Simulator knobs
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Home position; the relative altitude field is ignored
    pub home: Position,
    /// Delay between the first "disconnected" event and "connected"
    pub connect_delay: Duration,
    /// When false, `connect` fails as if nothing answered on the address
    pub reachable: bool,
    /// When false, telemetry streams end without producing a sample
    pub telemetry_ready: bool,
    /// Interval between telemetry samples
    pub telemetry_interval: Duration,
    pub takeoff_altitude_m: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            // PX4 SITL default home (Zurich)
            home: Position {
                latitude_deg: 47.397742,
                longitude_deg: 8.545594,
                absolute_altitude_m: 488.0,
                relative_altitude_m: 0.0,
            },
            connect_delay: Duration::from_millis(200),
            reachable: true,
            telemetry_ready: true,
            telemetry_interval: Duration::from_millis(100),
            takeoff_altitude_m: 2.5,
        }
    }
}

impl SimConfig {
    /// No artificial delays, for tests
    pub fn instant() -> Self {
        Self {
            connect_delay: Duration::ZERO,
            telemetry_interval: Duration::from_millis(1),
            ..Self::default()
        }
    }

    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn without_telemetry(mut self) -> Self {
        self.telemetry_ready = false;
        self
    }
}

/// A command as received by the simulator
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleCommand {
    Connect(String),
    Arm,
    Disarm,
    SetTakeoffAltitude(f32),
    Takeoff,
    Land,
    ReturnToLaunch,
    GotoLocation {
        latitude_deg: f64,
        longitude_deg: f64,
        altitude_m: f32,
        yaw_deg: f32,
    },
    DoOrbit {
        radius_m: f32,
        velocity_ms: f32,
        yaw_behavior: OrbitYawBehavior,
        latitude_deg: f64,
        longitude_deg: f64,
        absolute_altitude_m: f64,
    },
}

#[derive(Debug)]
struct SimState {
    connected: bool,
    armed: bool,
    in_air: bool,
    latitude_deg: f64,
    longitude_deg: f64,
    relative_altitude_m: f32,
    heading_deg: f64,
    takeoff_altitude_m: f32,
    journal: Vec<VehicleCommand>,
}

/// Simulated multicopter implementing [`VehicleBackend`]
#[derive(Clone)]
pub struct SimulatedVehicle {
    config: SimConfig,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedVehicle {
    pub fn new(config: SimConfig) -> Self {
        let state = SimState {
            connected: false,
            armed: false,
            in_air: false,
            latitude_deg: config.home.latitude_deg,
            longitude_deg: config.home.longitude_deg,
            relative_altitude_m: 0.0,
            heading_deg: 0.0,
            takeoff_altitude_m: config.takeoff_altitude_m,
            journal: Vec::new(),
        };

        Self {
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Every command received so far, in order
    pub fn journal(&self) -> Vec<VehicleCommand> {
        self.state().journal.clone()
    }

    pub fn is_armed(&self) -> bool {
        self.state().armed
    }

    pub fn is_in_air(&self) -> bool {
        self.state().in_air
    }

    /// Current position sample
    pub fn current_position(&self) -> Position {
        let state = self.state();
        self.position_of(&state)
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn position_of(&self, state: &SimState) -> Position {
        Position {
            latitude_deg: state.latitude_deg,
            longitude_deg: state.longitude_deg,
            absolute_altitude_m: self.config.home.absolute_altitude_m + state.relative_altitude_m,
            relative_altitude_m: state.relative_altitude_m,
        }
    }

    /// Record the command and check that a link exists
    fn accept(&self, command: VehicleCommand) -> Result<MutexGuard<'_, SimState>> {
        let mut state = self.state();
        debug!(?command, "sim received command");
        state.journal.push(command);
        if !state.connected {
            return Err(Error::new(ErrorKind::VehicleUnreachable, "no system connected"));
        }
        Ok(state)
    }

    fn telemetry_stream<T, F>(&self, sample: F) -> BoxStream<'static, Result<T>>
    where
        T: Send + 'static,
        F: Fn(&SimulatedVehicle, &SimState) -> T + Send + 'static,
    {
        if !self.config.telemetry_ready {
            return futures_util::stream::empty().boxed();
        }

        let vehicle = self.clone();
        let interval = self.config.telemetry_interval;
        async_stream::stream! {
            loop {
                let item = {
                    let state = vehicle.state();
                    if state.connected {
                        Ok(sample(&vehicle, &state))
                    } else {
                        Err(Error::new(ErrorKind::TelemetryUnavailable, "no system connected"))
                    }
                };
                let failed = item.is_err();
                yield item;
                if failed {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        }
        .boxed()
    }
}

impl Default for SimulatedVehicle {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

fn rejected(message: &str) -> Error {
    Error::new(ErrorKind::CommandRejected, message)
}

#[async_trait]
impl VehicleBackend for SimulatedVehicle {
    async fn connect(&self, address: &SystemAddress) -> Result<BoxStream<'static, ConnectionState>> {
        self.state().journal.push(VehicleCommand::Connect(address.to_string()));

        if !self.config.reachable {
            return Err(Error::new(
                ErrorKind::VehicleUnreachable,
                format!("no autopilot answered on {}", address),
            )
            .with_context("address", address.to_string()));
        }

        let state = Arc::clone(&self.state);
        let delay = self.config.connect_delay;
        Ok(async_stream::stream! {
            yield ConnectionState { is_connected: false };
            tokio::time::sleep(delay).await;
            state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).connected = true;
            yield ConnectionState { is_connected: true };
        }
        .boxed())
    }

    async fn arm(&self) -> Result<()> {
        let mut state = self.accept(VehicleCommand::Arm)?;
        state.armed = true;
        Ok(())
    }

    async fn disarm(&self) -> Result<()> {
        let mut state = self.accept(VehicleCommand::Disarm)?;
        if state.in_air {
            return Err(rejected("cannot disarm while in air"));
        }
        state.armed = false;
        Ok(())
    }

    async fn set_takeoff_altitude(&self, altitude_m: f32) -> Result<()> {
        let mut state = self.accept(VehicleCommand::SetTakeoffAltitude(altitude_m))?;
        if !altitude_m.is_finite() || altitude_m <= 0.0 {
            return Err(rejected("takeoff altitude must be positive"));
        }
        state.takeoff_altitude_m = altitude_m;
        Ok(())
    }

    async fn takeoff(&self) -> Result<()> {
        let mut state = self.accept(VehicleCommand::Takeoff)?;
        if !state.armed {
            return Err(rejected("vehicle not armed"));
        }
        state.in_air = true;
        state.relative_altitude_m = state.relative_altitude_m.max(state.takeoff_altitude_m);
        Ok(())
    }

    async fn land(&self) -> Result<()> {
        let mut state = self.accept(VehicleCommand::Land)?;
        state.in_air = false;
        state.relative_altitude_m = 0.0;
        // PX4 disarms automatically after touchdown
        state.armed = false;
        Ok(())
    }

    async fn return_to_launch(&self) -> Result<()> {
        let mut state = self.accept(VehicleCommand::ReturnToLaunch)?;
        if !state.in_air {
            return Err(rejected("return to launch requires the vehicle to be flying"));
        }
        state.latitude_deg = self.config.home.latitude_deg;
        state.longitude_deg = self.config.home.longitude_deg;
        state.in_air = false;
        state.relative_altitude_m = 0.0;
        state.armed = false;
        Ok(())
    }

    async fn goto_location(
        &self,
        latitude_deg: f64,
        longitude_deg: f64,
        altitude_m: f32,
        yaw_deg: f32,
    ) -> Result<()> {
        let mut state = self.accept(VehicleCommand::GotoLocation {
            latitude_deg,
            longitude_deg,
            altitude_m,
            yaw_deg,
        })?;
        if !state.in_air {
            return Err(rejected("goto requires the vehicle to be flying"));
        }
        if !(-90.0..=90.0).contains(&latitude_deg) || !(-180.0..=180.0).contains(&longitude_deg) {
            return Err(rejected("target coordinates out of range"));
        }
        state.latitude_deg = latitude_deg;
        state.longitude_deg = longitude_deg;
        state.relative_altitude_m = altitude_m - self.config.home.absolute_altitude_m;
        if yaw_deg.is_finite() {
            state.heading_deg = f64::from(yaw_deg).rem_euclid(360.0);
        }
        Ok(())
    }

    async fn do_orbit(
        &self,
        radius_m: f32,
        velocity_ms: f32,
        yaw_behavior: OrbitYawBehavior,
        latitude_deg: f64,
        longitude_deg: f64,
        absolute_altitude_m: f64,
    ) -> Result<()> {
        let mut state = self.accept(VehicleCommand::DoOrbit {
            radius_m,
            velocity_ms,
            yaw_behavior,
            latitude_deg,
            longitude_deg,
            absolute_altitude_m,
        })?;
        if !state.in_air {
            return Err(rejected("orbit requires the vehicle to be flying"));
        }
        if !(radius_m.is_finite() && radius_m > 0.0) {
            return Err(rejected("orbit radius must be positive"));
        }

        let center_lat = if latitude_deg.is_nan() { state.latitude_deg } else { latitude_deg };
        let center_lon = if longitude_deg.is_nan() { state.longitude_deg } else { longitude_deg };
        if !absolute_altitude_m.is_nan() {
            state.relative_altitude_m =
                (absolute_altitude_m - f64::from(self.config.home.absolute_altitude_m)) as f32;
        }

        // Place the vehicle on the circle, due north of the center, facing it.
        state.latitude_deg = center_lat + f64::from(radius_m) / METERS_PER_DEGREE_LAT;
        state.longitude_deg = center_lon;
        if yaw_behavior == OrbitYawBehavior::HoldFrontToCircleCenter {
            state.heading_deg = 180.0;
        }
        Ok(())
    }

    fn position(&self) -> BoxStream<'static, Result<Position>> {
        self.telemetry_stream(|vehicle, state| vehicle.position_of(state))
    }

    fn heading(&self) -> BoxStream<'static, Result<Heading>> {
        self.telemetry_stream(|_, state| Heading {
            heading_deg: state.heading_deg,
        })
    }

    fn armed(&self) -> BoxStream<'static, Result<bool>> {
        self.telemetry_stream(|_, state| state.armed)
    }

    fn in_air(&self) -> BoxStream<'static, Result<bool>> {
        self.telemetry_stream(|_, state| state.in_air)
    }
}
