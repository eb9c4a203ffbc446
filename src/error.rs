//! Unified error types for the levitation controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control tick's error handling uniform.  All variants are `Copy` so they
//! can be passed through events and tick outcomes without allocation.
//! None of these escape the control tick: the arbiter and the controllers
//! handle each one locally (skip, fallback, or drop).

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Distance outside the `(0, 400]` cm window, or not a number.
    /// Rejected at the sample feed; never reaches the freshness cache.
    InvalidSample,
    /// No sample younger than the staleness threshold.  The tick is skipped
    /// and no command is sent.
    StaleInput,
    /// Fuzzy inference produced an undefined result (empty aggregate,
    /// non-finite centroid, missing lookup data).  The controller answers
    /// with its fallback power instead.
    InferenceFailure,
    /// Historical records were malformed or insufficient.  The prior
    /// configuration is retained.
    CalibrationData(CalibrationDataError),
    /// The actuation link refused the command.  Dropped, never retried.
    ActuationLinkUnavailable,
    /// Configuration is out of range.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSample => write!(f, "invalid distance sample"),
            Self::StaleInput => write!(f, "no fresh distance sample"),
            Self::InferenceFailure => write!(f, "fuzzy inference failed"),
            Self::CalibrationData(e) => write!(f, "calibration: {e}"),
            Self::ActuationLinkUnavailable => write!(f, "actuation link unavailable"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Calibration data errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationDataError {
    /// Fewer usable records than the configured noise floor.
    InsufficientRecords,
    /// A log line had the wrong column count or a non-numeric field.
    MalformedRecord,
    /// Every desired-height group fell below the noise floor.
    NoUsableGroups,
    /// More lookup points than the table can hold.
    TableOverflow,
}

impl fmt::Display for CalibrationDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientRecords => write!(f, "not enough records"),
            Self::MalformedRecord => write!(f, "malformed record"),
            Self::NoUsableGroups => write!(f, "no usable desired-height groups"),
            Self::TableOverflow => write!(f, "lookup table overflow"),
        }
    }
}

impl From<CalibrationDataError> for Error {
    fn from(e: CalibrationDataError) -> Self {
        Self::CalibrationData(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_nests_calibration_detail() {
        let e: Error = CalibrationDataError::NoUsableGroups.into();
        assert_eq!(e.to_string(), "calibration: no usable desired-height groups");
    }

    #[test]
    fn config_message_is_carried() {
        let e = Error::Config("smoothing_alpha must be in (0, 1]");
        assert!(e.to_string().contains("smoothing_alpha"));
    }
}
