//! Port traits: the hexagonal boundary between the arbiter and the outside
//! world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlArbiter (domain)
//! ```
//!
//! The arbiter consumes these via generics so that the control path never
//! touches a serial port, a file or the wall clock directly.

use heapless::String;

use crate::calibration::history::{HistoryRecord, TIMESTAMP_LEN};
use crate::config::SystemConfig;
use crate::error::Error;

// ───────────────────────────────────────────────────────────────
// Actuation link (driven adapter: domain → fan)
// ───────────────────────────────────────────────────────────────

/// Write side of the sensing/actuation link.
pub trait ActuationLink {
    /// Send a fan power in `[0, 100]`.  Fire-and-forget: a refusal is
    /// reported as [`Error::ActuationLinkUnavailable`] and never retried.
    fn send_power(&mut self, power_pct: f32) -> Result<(), Error>;
}

// ───────────────────────────────────────────────────────────────
// History sink (driven adapter: domain → log file)
// ───────────────────────────────────────────────────────────────

/// Receives rate-limited history records.  Must not block the tick for
/// long; file adapters buffer.
pub trait HistorySink {
    fn record(&mut self, record: &HistoryRecord);
}

impl<T: HistorySink + ?Sized> HistorySink for Box<T> {
    fn record(&mut self, record: &HistoryRecord) {
        (**self).record(record);
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink (driven adapter: domain → logging / status)
// ───────────────────────────────────────────────────────────────

pub trait EventSink {
    fn emit(&mut self, event: &super::events::ArbiterEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

pub trait Clock {
    /// Monotonic milliseconds since an arbitrary origin.
    fn now_ms(&self) -> u64;

    /// Wall time for history records, ISO-8601 with milliseconds.
    fn wall_time_iso(&self) -> String<TIMESTAMP_LEN>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    /// Returns [`SystemConfig::default()`] if nothing is stored yet.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    NotFound,
    /// Stored config failed to deserialize.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<Error> for ConfigError {
    fn from(e: Error) -> Self {
        match e {
            Error::Config(msg) => Self::ValidationFailed(msg),
            _ => Self::Corrupted,
        }
    }
}
