//! Port traits: the hexagonal boundary between the composter core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ComposterCore (domain)
//! ```
//!
//! Driven adapters (sensors, storage, HTTP) implement these traits.  The
//! classifiers and the cloud engine consume them via generics, so the
//! domain never touches hardware or sockets directly.
//!
//! ## Security notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **HttpTransport** implementations MUST use TLS; the auth token travels
//!   in the query string.

use crate::config::ComposterConfig;
use crate::error::{SensorError, TransportError};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One scalar measurement source.
///
/// Humidity reads in %RH, temperature in °C, distance in cm.
pub trait SensorPort: Send {
    fn read(&mut self) -> Result<f32, SensorError>;

    /// Re-initialise the device after repeated failures.
    fn reset(&mut self) -> Result<(), SensorError> {
        Ok(())
    }
}

impl<S: SensorPort + ?Sized> SensorPort for Box<S> {
    fn read(&mut self) -> Result<f32, SensorError> {
        (**self).read()
    }

    fn reset(&mut self) -> Result<(), SensorError> {
        (**self).reset()
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the composter configuration.
///
/// # Security
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges should be rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped: a mistyped threshold must not leave the fan or
/// crusher running unbounded.
pub trait ConfigPort {
    /// Returns [`ComposterConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<ComposterConfig, ConfigError>;

    fn save(&self, config: &ComposterConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for NVS, credentials, counters.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic; the ESP-IDF NVS API guarantees this.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// HTTP transport (driven adapter: domain → network)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Patch,
    Post,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Blocking request/response over HTTPS.  JSON bodies only.
pub trait HttpTransport: Send {
    fn request(&mut self, method: Method, url: &str, body: Option<&[u8]>) -> Result<HttpResponse, TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    StorageFull,
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, PartialEq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
