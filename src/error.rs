//! Unified error types for the composter firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! bootstrap and task-level error handling uniform.  All variants are
//! `Copy` so they can be logged and passed between tasks without
//! allocation.
//!
//! Interlock refusals are not errors: a controller declining an unsafe
//! transition takes a normal branch (see
//! [`Transition`](crate::actuators::Transition)).

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or returned implausible data.
    Sensor(SensorError),
    /// An actuator output could not be driven.
    Actuator(ActuatorError),
    /// The cloud document store rejected or failed a request.
    Cloud(CloudError),
    /// A communication subsystem failed.
    Comms(CommsError),
    /// Peripheral or subsystem initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Cloud(e) => write!(f, "cloud: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The transducer did not answer or the protocol round-trip failed.
    ReadFailed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// No sample has been produced yet.
    NotReady,
    /// Driver re-initialisation failed.
    ResetFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "read failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::NotReady => write!(f, "no sample yet"),
            Self::ResetFailed => write!(f, "driver reset failed"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl std::error::Error for ActuatorError {}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Cloud errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudError {
    /// The HTTP transport failed before a status line was received.
    Transport(TransportError),
    /// The server answered with a non-200 status (after the single retry).
    HttpStatus(u16),
    /// Sign-in or token exchange was rejected.
    AuthFailed,
    /// A data request was attempted without a session.
    NotAuthenticated,
    /// A response body could not be decoded.
    Decode,
    /// A request body could not be encoded.
    Encode,
}

impl CloudError {
    /// Whether this failure means the session itself is unusable.
    pub const fn is_auth(self) -> bool {
        matches!(self, Self::AuthFailed | Self::NotAuthenticated)
    }
}

impl fmt::Display for CloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::HttpStatus(code) => write!(f, "HTTP status {code}"),
            Self::AuthFailed => write!(f, "authentication rejected"),
            Self::NotAuthenticated => write!(f, "no active session"),
            Self::Decode => write!(f, "malformed response body"),
            Self::Encode => write!(f, "request body encoding failed"),
        }
    }
}

impl std::error::Error for CloudError {}

impl From<CloudError> for Error {
    fn from(e: CloudError) -> Self {
        Self::Cloud(e)
    }
}

/// Failures below the HTTP status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Connection or TLS handshake failed.
    Connect,
    /// The request timed out.
    Timeout,
    /// Reading or writing the body failed.
    Io,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect failed"),
            Self::Timeout => write!(f, "timed out"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for CloudError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    WifiConnectFailed,
    WifiDisconnected,
    /// The event bus subscriber table is full.
    BusFull,
    /// A spawned task could not be created.
    TaskSpawnFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiConnectFailed => write!(f, "WiFi connect failed"),
            Self::WifiDisconnected => write!(f, "WiFi disconnected"),
            Self::BusFull => write!(f, "event bus subscriber table full"),
            Self::TaskSpawnFailed => write!(f, "task spawn failed"),
        }
    }
}

impl std::error::Error for CommsError {}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
