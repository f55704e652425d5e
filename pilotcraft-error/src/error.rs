//! The pilotcraft `Error`

use crate::{ErrorKind, ErrorStatus};
use std::fmt;
use std::time::Duration;

/// Error returned by every pilotcraft crate.
///
/// The kind says what went wrong and the status says whether trying again
/// can help. `operation` names where it failed (`drone::arm`,
/// `bridge::run`); context pairs carry the values that matter for that
/// failure, such as the address, tool name or color.
///
/// ```rust
/// use pilotcraft_error::{Error, ErrorKind};
///
/// let err = Error::new(ErrorKind::BridgeTimeout, "vehicle call did not complete")
///     .with_operation("bridge::run")
///     .with_context("timeout_ms", "60000");
///
/// assert_eq!(err.kind(), ErrorKind::BridgeTimeout);
/// assert!(err.is_retryable());
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: ErrorStatus,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Status starts out as whatever the kind implies
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: ErrorStatus::default_for(kind),
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Text meant for people; tools show it to the model verbatim
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }

    /// Record where the error passed through. An earlier operation is kept
    /// in context under `called`.
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called", self.operation.to_string()));
        }
        self.operation = operation;
        self
    }

    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Attach the underlying error. Only one source per error.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }

    /// The caller gave up retrying
    pub fn persist(mut self) -> Self {
        self.status = self.status.persist();
        self
    }
}

/// `NotConnected (permanent) at drone::arm => drone not connected [command=arm]`
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.status)?;
        if !self.operation.is_empty() {
            write!(f, " at {}", self.operation)?;
        }
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        if let Some(((first_key, first), rest)) = self.context.split_first() {
            write!(f, " [{}={}", first_key, first)?;
            for (key, value) in rest {
                write!(f, ", {}={}", key, value)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Error");
        s.field("kind", &self.kind).field("status", &self.status);
        if !self.operation.is_empty() {
            s.field("operation", &self.operation);
        }
        s.field("message", &self.message);
        if !self.context.is_empty() {
            s.field("context", &self.context);
        }
        if let Some(source) = &self.source {
            s.field("source", source);
        }
        s.finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::IoFailed, err.to_string())
            .with_operation("io")
            .set_source(err)
    }
}

// Shorthands for the kinds raised in more than one place

impl Error {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailed, message)
    }

    /// `command` is what was refused, e.g. "arm"
    pub fn not_connected(command: impl Into<String>) -> Self {
        let command = command.into();
        Self::new(ErrorKind::NotConnected, format!("drone not connected, cannot {}", command))
            .with_context("command", command)
    }

    pub fn bridge_closed() -> Self {
        Self::new(ErrorKind::BridgeClosed, "bridge worker is not running")
    }

    pub fn bridge_timeout(timeout: Duration) -> Self {
        Self::new(
            ErrorKind::BridgeTimeout,
            format!("bridged call did not complete within {:?}", timeout),
        )
        .with_context("timeout_ms", timeout.as_millis().to_string())
    }

    pub fn bridge_panicked(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BridgePanicked, message)
    }

    pub fn invalid_color(color: impl Into<String>) -> Self {
        let color = color.into();
        Self::new(ErrorKind::InvalidColor, format!("'{}' is not a valid color", color))
            .with_context("color", color)
    }

    pub fn tool_not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorKind::ToolNotFound, format!("unknown tool '{}'", name)).with_context("tool", name)
    }
}
