//! # pilotcraft-error
//!
//! One error type for the whole workspace.
//!
//! - [`ErrorKind`] says what happened (`NotConnected`, `BridgeClosed`, ...)
//! - [`ErrorStatus`] says whether retrying can help
//! - `operation` and context pairs say where and with which values
//! - the source keeps the underlying error without exposing its type
//!
//! ```rust
//! use pilotcraft_error::{Error, ErrorKind};
//!
//! fn connect() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::VehicleUnreachable, "no heartbeat on udp://:14540")
//!         .with_operation("drone::connect")
//!         .with_context("address", "udp://:14540"))
//! }
//!
//! assert!(connect().unwrap_err().is_retryable());
//! ```
//!
//! An error is handled once; code it passes through only adds an operation
//! or context. Foreign errors are wrapped with `set_source` rather than
//! converted through blanket `From` impls (`std::io::Error` and the provider
//! error are the exceptions).

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

pub type Result<T> = std::result::Result<T, Error>;
