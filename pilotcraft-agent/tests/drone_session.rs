//! End-to-end drone scenarios with a scripted model and a recording vehicle

mod common;

use async_trait::async_trait;
use common::{answer, call, code, ScriptedProvider};
use futures_util::stream::BoxStream;
use pilotcraft_agent::{Agent, AgentConfig, DroneSession};
use pilotcraft_core::vehicle::{ConnectionState, Heading, Position};
use pilotcraft_core::{
    BridgeConfig, DroneConfig, OrbitYawBehavior, SimConfig, SimulatedVehicle,
    SystemAddress, VehicleBackend, VehicleCommand,
};
use pilotcraft_error::{Error, ErrorKind, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// Fixtures
// ============================================================================

/// Simulator wrapper that can refuse to arm or hang on land
struct FaultyVehicle {
    sim: SimulatedVehicle,
    refuse_arm: bool,
    hang_on_land: bool,
    takeoffs: AtomicUsize,
}

impl FaultyVehicle {
    fn new(sim: SimulatedVehicle) -> Self {
        Self {
            sim,
            refuse_arm: false,
            hang_on_land: false,
            takeoffs: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VehicleBackend for FaultyVehicle {
    async fn connect(&self, address: &SystemAddress) -> Result<BoxStream<'static, ConnectionState>> {
        self.sim.connect(address).await
    }

    async fn arm(&self) -> Result<()> {
        if self.refuse_arm {
            return Err(Error::new(ErrorKind::CommandRejected, "pre-arm check failed: no GPS lock"));
        }
        self.sim.arm().await
    }

    async fn disarm(&self) -> Result<()> {
        self.sim.disarm().await
    }

    async fn set_takeoff_altitude(&self, altitude_m: f32) -> Result<()> {
        self.sim.set_takeoff_altitude(altitude_m).await
    }

    async fn takeoff(&self) -> Result<()> {
        self.takeoffs.fetch_add(1, Ordering::SeqCst);
        self.sim.takeoff().await
    }

    async fn land(&self) -> Result<()> {
        if self.hang_on_land {
            std::future::pending::<()>().await;
        }
        self.sim.land().await
    }

    async fn return_to_launch(&self) -> Result<()> {
        self.sim.return_to_launch().await
    }

    async fn goto_location(&self, latitude_deg: f64, longitude_deg: f64, altitude_m: f32, yaw_deg: f32) -> Result<()> {
        self.sim.goto_location(latitude_deg, longitude_deg, altitude_m, yaw_deg).await
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
        self.sim
            .do_orbit(radius_m, velocity_ms, yaw_behavior, latitude_deg, longitude_deg, absolute_altitude_m)
            .await
    }

    fn position(&self) -> BoxStream<'static, Result<Position>> {
        self.sim.position()
    }

    fn heading(&self) -> BoxStream<'static, Result<Heading>> {
        self.sim.heading()
    }

    fn armed(&self) -> BoxStream<'static, Result<bool>> {
        self.sim.armed()
    }

    fn in_air(&self) -> BoxStream<'static, Result<bool>> {
        self.sim.in_air()
    }
}

fn session(backend: Arc<dyn VehicleBackend>, bridge: BridgeConfig) -> DroneSession {
    DroneSession::new(backend, DroneConfig::default().with_takeoff_settle(Duration::ZERO), bridge).unwrap()
}

fn simulated() -> (SimulatedVehicle, DroneSession) {
    let sim = SimulatedVehicle::new(SimConfig::instant());
    let session = session(Arc::new(sim.clone()), BridgeConfig::default());
    (sim, session)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn connect_then_take_off() {
    let (sim, session) = simulated();
    let provider = ScriptedProvider::new([code("print(connect_to_drone())"), code("print(arm_and_takeoff())")]);
    let mut agent = Agent::new(provider, AgentConfig::drone());

    let first = agent.run(session.tools(), "connect to the drone").await.unwrap();
    assert_eq!(first.summary(), Some("Successfully connected to the drone."));

    let second = agent.run(session.tools(), "take off").await.unwrap();
    assert_eq!(second.summary(), Some("Takeoff sequence initiated successfully."));

    assert!(sim.is_in_air());
    assert_eq!(sim.journal()[1..], [VehicleCommand::Arm, VehicleCommand::Takeoff]);
}

#[tokio::test]
async fn take_off_without_connect_never_reaches_the_vehicle() {
    let (sim, session) = simulated();
    let provider = ScriptedProvider::new([code("print(arm_and_takeoff())")]);
    let mut agent = Agent::new(provider, AgentConfig::drone());

    let outcome = agent.run(session.tools(), "take off").await.unwrap();
    assert_eq!(outcome.summary(), Some("Arming failed. Cannot take off."));
    assert!(sim.journal().is_empty());
}

#[tokio::test]
async fn arm_failure_skips_takeoff() {
    let mut backend = FaultyVehicle::new(SimulatedVehicle::new(SimConfig::instant()));
    backend.refuse_arm = true;
    let backend = Arc::new(backend);
    let session = session(backend.clone(), BridgeConfig::default());

    let provider = ScriptedProvider::new([call("connect_to_drone"), call("arm_and_takeoff")]);
    let mut agent = Agent::new(provider, AgentConfig::drone());
    agent.run(session.tools(), "connect").await.unwrap();
    let outcome = agent.run(session.tools(), "take off").await.unwrap();

    assert_eq!(
        outcome.summary(),
        Some("Arming failed. Cannot take off. Reason: pre-arm check failed: no GPS lock")
    );
    assert_eq!(backend.takeoffs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn mission_runs_several_steps() {
    let (sim, session) = simulated();
    let provider = ScriptedProvider::new([
        call("connect_to_drone"),
        call("arm_and_takeoff"),
        call("return_to_launch"),
        answer("Mission complete: took off and returned home."),
    ]);
    let mut agent = Agent::new(provider, AgentConfig::mission());

    let outcome = agent.run(session.tools(), "take off and come back").await.unwrap();
    assert_eq!(outcome.steps, 4);
    let outputs: Vec<&str> = outcome.observations.iter().map(|o| o.output.as_str()).collect();
    assert_eq!(
        outputs,
        vec![
            "Successfully connected to the drone.",
            "Takeoff sequence initiated successfully.",
            "Returning to launch.",
        ]
    );
    assert_eq!(outcome.final_answer.as_deref(), Some("Mission complete: took off and returned home."));
    assert!(!sim.is_in_air());
}

#[tokio::test]
async fn telemetry_reports_position() {
    let (_, session) = simulated();
    let provider = ScriptedProvider::new([call("connect_to_drone"), code("get_drone_telemetry()")]);
    let mut agent = Agent::new(provider, AgentConfig::drone());
    agent.run(session.tools(), "connect").await.unwrap();

    let outcome = agent.run(session.tools(), "where are you").await.unwrap();
    let telemetry: serde_json::Value = serde_json::from_str(&outcome.observations[0].output).unwrap();
    assert_eq!(telemetry["latitude_deg"], 47.397742);
    assert_eq!(telemetry["is_armed"], false);
}

#[test]
fn shutdown_is_bounded_with_a_hung_call() {
    let mut backend = FaultyVehicle::new(SimulatedVehicle::new(SimConfig::instant()));
    backend.hang_on_land = true;
    let session = Arc::new(session(
        Arc::new(backend),
        BridgeConfig::default()
            .with_call_timeout(None)
            .with_shutdown_grace(Duration::from_millis(100)),
    ));

    session.tools().call("connect_to_drone", &serde_json::json!({})).unwrap();
    let caller = {
        let session = Arc::clone(&session);
        std::thread::spawn(move || session.tools().call("land_drone", &serde_json::json!({})))
    };
    std::thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    session.close().unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    let err = caller.join().unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BridgeClosed);
}

#[test]
fn hung_call_times_out() {
    let mut backend = FaultyVehicle::new(SimulatedVehicle::new(SimConfig::instant()));
    backend.hang_on_land = true;
    let session = session(
        Arc::new(backend),
        BridgeConfig::default().with_call_timeout(Some(Duration::from_millis(100))),
    );

    session.tools().call("connect_to_drone", &serde_json::json!({})).unwrap();
    let out = session.tools().call("land_drone", &serde_json::json!({})).unwrap();
    assert!(out.starts_with("Landing failed: bridged call did not complete"), "{}", out);
}
