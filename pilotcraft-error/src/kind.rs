//! What went wrong

use std::fmt;

/// Callers match on the kind to decide whether an error becomes text for
/// the model, a line printed at the prompt, or the end of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Catch-all; seeing it means a case is not handled yet
    Unexpected,
    ConfigInvalid,
    /// Bad tool or function argument
    InvalidArgument,

    /// A command other than connect before the vehicle connected
    NotConnected,
    VehicleUnreachable,
    /// The vehicle acknowledged the command and refused it
    CommandRejected,
    /// A telemetry stream failed
    TelemetryUnavailable,
    /// A telemetry stream ended before its first sample
    TelemetryNotReady,

    /// The bridge worker is gone and takes no more work
    BridgeClosed,
    BridgeTimeout,
    /// A bridged future panicked on the worker thread
    BridgePanicked,

    InvalidColor,
    ToolNotFound,

    InferenceFailed,
    ProviderUnavailable,
    RateLimited,

    IoFailed,
    NetworkFailed,
    ParseFailed,
}

impl ErrorKind {
    /// Kinds where the same call may succeed later
    pub fn is_retryable(&self) -> bool {
        use ErrorKind::*;
        matches!(
            self,
            InferenceFailed
                | NetworkFailed
                | RateLimited
                | ProviderUnavailable
                | VehicleUnreachable
                | BridgeTimeout
                | TelemetryNotReady
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
