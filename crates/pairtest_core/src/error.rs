//! Error types for pairtest_core operations.

use thiserror::Error;

/// Core error type for the conformance harness.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The service under test could not be launched or died during startup.
    #[error("failed to start service: {0}")]
    Startup(String),

    /// A service is already being supervised.
    #[error("service already running (PID: {pid})")]
    AlreadyRunning {
        /// Process ID of the running service
        pid: u32,
    },

    /// The handshake frame was missing or malformed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The service rejected the WebSocket upgrade.
    #[error("connection refused by service: HTTP {status}")]
    Refused {
        /// HTTP status returned instead of the upgrade
        status: u16,
    },

    /// The session was closed by the service.
    #[error("connection closed: {0}")]
    Closed(String),

    /// Transport-level failure that is not a close signal.
    #[error("transport error: {0}")]
    Transport(String),

    /// A relay frame could not be decoded.
    #[error("invalid relay frame: {0}")]
    Frame(String),

    /// An observed value did not match the service contract.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// A configuration option holds a value its consumer cannot use.
    #[error("invalid value for option '{name}': {value:?} ({reason})")]
    InvalidOption {
        /// Option name
        name: String,
        /// Raw value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// An override names an option the harness does not know.
    #[error("unknown option: {0}")]
    UnknownOption(String),

    /// A scenario name did not match any known scenario.
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    /// A scenario failed; wraps the underlying cause.
    #[error("scenario '{scenario}' failed: {source}")]
    ScenarioFailed {
        /// Name of the failing scenario
        scenario: String,
        /// Underlying failure
        #[source]
        source: Box<HarnessError>,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Returns true if this error is a close signal from the far end.
    pub fn is_close_signal(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    /// Returns a user-facing hint for the error, if one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Startup(_) => Some(
                "Check TEST_APP_PATH points at a built service binary, or set it empty to test an already running service.",
            ),
            Self::AlreadyRunning { .. } => Some("Stop the supervised service before starting another."),
            Self::Refused { .. } | Self::Transport(_) => {
                Some("Is the service listening on the configured TEST_HOST and TEST_PORT?")
            }
            Self::Handshake(_) => {
                Some("The service must send a JSON frame with a 'link' field right after connecting.")
            }
            Self::InvalidOption { .. } | Self::UnknownOption(_) => {
                Some("Run 'pairtest config' to inspect the resolved options.")
            }
            Self::UnknownScenario(_) => Some("Run 'pairtest list' to see available scenarios."),
            Self::ScenarioFailed { source, .. } => source.hint(),
            _ => None,
        }
    }
}

/// Convenience Result type for pairtest_core operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
