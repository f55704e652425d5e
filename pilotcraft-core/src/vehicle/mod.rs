//! # Vehicle control
//!
//! `VehicleBackend` is the seam to the autopilot protocol client. The
//! controller in [`controller`] adds the connection guard on top of it, and
//! [`sim`] provides an in-process vehicle for sessions and tests.

pub mod controller;
pub mod sim;

pub use controller::{DroneConfig, DroneController, Telemetry};
pub use sim::{SimConfig, SimulatedVehicle, VehicleCommand};

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use pilotcraft_error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default MAVLink UDP port for a PX4 SITL instance
pub const DEFAULT_UDP_PORT: u16 = 14540;

// ============================================================================
// Telemetry types
// ============================================================================

/// Connection state event emitted while connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub is_connected: bool,
}

/// Global position sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    /// Altitude above mean sea level
    pub absolute_altitude_m: f32,
    /// Altitude above the takeoff point
    pub relative_altitude_m: f32,
}

/// Heading sample, degrees clockwise from north
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub heading_deg: f64,
}

/// What the vehicle's nose does while orbiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrbitYawBehavior {
    #[default]
    HoldFrontToCircleCenter,
    HoldInitialHeading,
    Uncontrolled,
    HoldFrontTangentToCircle,
    RcControlled,
}

impl OrbitYawBehavior {
    pub const ALL: [OrbitYawBehavior; 5] = [
        OrbitYawBehavior::HoldFrontToCircleCenter,
        OrbitYawBehavior::HoldInitialHeading,
        OrbitYawBehavior::Uncontrolled,
        OrbitYawBehavior::HoldFrontTangentToCircle,
        OrbitYawBehavior::RcControlled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrbitYawBehavior::HoldFrontToCircleCenter => "hold_front_to_circle_center",
            OrbitYawBehavior::HoldInitialHeading => "hold_initial_heading",
            OrbitYawBehavior::Uncontrolled => "uncontrolled",
            OrbitYawBehavior::HoldFrontTangentToCircle => "hold_front_tangent_to_circle",
            OrbitYawBehavior::RcControlled => "rc_controlled",
        }
    }
}

impl fmt::Display for OrbitYawBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrbitYawBehavior {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == normalized)
            .ok_or_else(|| {
                Error::invalid_argument(format!("unknown orbit yaw behavior '{}'", s))
                    .with_context("yaw_behavior", s)
            })
    }
}

// ============================================================================
// System address
// ============================================================================

/// Where the autopilot lives, in MAVSDK connection-URL form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemAddress {
    /// `udp://[host]:port` - an empty host listens on all interfaces
    Udp { host: Option<String>, port: u16 },
    /// `tcp://host:port`
    Tcp { host: String, port: u16 },
    /// `serial:///dev/ttyUSB0[:baudrate]`
    Serial { path: String, baudrate: Option<u32> },
}

impl Default for SystemAddress {
    fn default() -> Self {
        SystemAddress::Udp {
            host: None,
            port: DEFAULT_UDP_PORT,
        }
    }
}

impl FromStr for SystemAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            Error::config_invalid(format!("invalid system address '{}': {}", s, reason))
                .with_context("address", s)
        };

        let (scheme, rest) = s.split_once("://").ok_or_else(|| invalid("missing scheme"))?;

        match scheme {
            "udp" | "tcp" => {
                let (host, port) = rest.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
                let port: u16 = port.parse().map_err(|_| invalid("port is not a number"))?;
                if scheme == "udp" {
                    Ok(SystemAddress::Udp {
                        host: (!host.is_empty()).then(|| host.to_string()),
                        port,
                    })
                } else if host.is_empty() {
                    Err(invalid("tcp needs a host"))
                } else {
                    Ok(SystemAddress::Tcp {
                        host: host.to_string(),
                        port,
                    })
                }
            }
            "serial" => {
                if rest.is_empty() {
                    return Err(invalid("missing device path"));
                }
                match rest.rsplit_once(':') {
                    Some((path, baud)) if !path.is_empty() => {
                        let baudrate = baud.parse().map_err(|_| invalid("baudrate is not a number"))?;
                        Ok(SystemAddress::Serial {
                            path: path.to_string(),
                            baudrate: Some(baudrate),
                        })
                    }
                    _ => Ok(SystemAddress::Serial {
                        path: rest.to_string(),
                        baudrate: None,
                    }),
                }
            }
            other => Err(invalid(&format!("unsupported scheme '{}'", other))),
        }
    }
}

impl fmt::Display for SystemAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemAddress::Udp { host, port } => {
                write!(f, "udp://{}:{}", host.as_deref().unwrap_or(""), port)
            }
            SystemAddress::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            SystemAddress::Serial { path, baudrate } => match baudrate {
                Some(baud) => write!(f, "serial://{}:{}", path, baud),
                None => write!(f, "serial://{}", path),
            },
        }
    }
}

// ============================================================================
// Backend trait
// ============================================================================

/// The async autopilot client the controller drives.
///
/// Commands resolve once the vehicle has acknowledged them. Telemetry
/// accessors return live streams; an `Err` item means the backend failed to
/// produce a sample, and an exhausted stream means no sample is available.
#[async_trait]
pub trait VehicleBackend: Send + Sync {
    /// Start connecting and return the stream of connection-state events
    async fn connect(&self, address: &SystemAddress) -> Result<BoxStream<'static, ConnectionState>>;

    async fn arm(&self) -> Result<()>;

    async fn disarm(&self) -> Result<()>;

    async fn set_takeoff_altitude(&self, altitude_m: f32) -> Result<()>;

    async fn takeoff(&self) -> Result<()>;

    async fn land(&self) -> Result<()>;

    async fn return_to_launch(&self) -> Result<()>;

    /// Fly to a global position. `altitude_m` is AMSL; a NaN yaw keeps the
    /// current heading.
    async fn goto_location(
        &self,
        latitude_deg: f64,
        longitude_deg: f64,
        altitude_m: f32,
        yaw_deg: f32,
    ) -> Result<()>;

    /// Circle a point. NaN center coordinates or altitude mean "current".
    async fn do_orbit(
        &self,
        radius_m: f32,
        velocity_ms: f32,
        yaw_behavior: OrbitYawBehavior,
        latitude_deg: f64,
        longitude_deg: f64,
        absolute_altitude_m: f64,
    ) -> Result<()>;

    fn position(&self) -> BoxStream<'static, Result<Position>>;

    fn heading(&self) -> BoxStream<'static, Result<Heading>>;

    fn armed(&self) -> BoxStream<'static, Result<bool>>;

    fn in_air(&self) -> BoxStream<'static, Result<bool>>;
}
