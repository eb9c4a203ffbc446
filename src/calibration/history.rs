//! History log record format.
//!
//! ```text
//! timestamp,distance_cm,measured_height_cm,desired_height_cm,power_pct,mode
//! 2025-03-14T09:26:53.589,31.250,18.750,20.000,57.000,proportional
//! ```
//!
//! Numeric columns are written with exactly three decimals.  Parsing is
//! lenient per line: anything with the wrong column count, a non-numeric
//! field or an unknown mode is counted and skipped.

use core::fmt::Write as _;

use heapless::String;
use log::debug;

use crate::error::{CalibrationDataError, Result};
use crate::fsm::ControlMode;

pub const HEADER: &str = "timestamp,distance_cm,measured_height_cm,desired_height_cm,power_pct,mode";

/// Capacity of the timestamp column.
pub const TIMESTAMP_LEN: usize = 32;

const COLUMNS: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub timestamp: String<TIMESTAMP_LEN>,
    pub distance_cm: f32,
    pub measured_height_cm: f32,
    pub desired_height_cm: f32,
    pub power_pct: f32,
    pub mode: ControlMode,
}

impl HistoryRecord {
    /// One CSV line without the trailing newline.
    pub fn to_line(&self) -> std::string::String {
        let mut line = std::string::String::with_capacity(80);
        // Writing into a String cannot fail.
        let _ = write!(
            line,
            "{},{:.3},{:.3},{:.3},{:.3},{}",
            self.timestamp,
            self.distance_cm,
            self.measured_height_cm,
            self.desired_height_cm,
            self.power_pct,
            self.mode.name()
        );
        line
    }

    pub fn parse_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
        if fields.len() != COLUMNS {
            return Err(CalibrationDataError::MalformedRecord.into());
        }
        let timestamp =
            String::try_from(fields[0]).map_err(|_| CalibrationDataError::MalformedRecord)?;
        let number = |s: &str| -> Result<f32> {
            match s.parse::<f32>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(CalibrationDataError::MalformedRecord.into()),
            }
        };
        Ok(Self {
            timestamp,
            distance_cm: number(fields[1])?,
            measured_height_cm: number(fields[2])?,
            desired_height_cm: number(fields[3])?,
            power_pct: number(fields[4])?,
            mode: ControlMode::from_name(fields[5]).ok_or(CalibrationDataError::MalformedRecord)?,
        })
    }

    /// `|measured - desired|`.
    pub fn tracking_error(&self) -> f32 {
        (self.measured_height_cm - self.desired_height_cm).abs()
    }
}

/// Records recovered from a log plus how many lines were rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedHistory {
    pub records: Vec<HistoryRecord>,
    pub skipped: usize,
}

/// Parse a whole log.  The header line and blank lines are not counted as
/// skipped.
pub fn parse_history(text: &str) -> ParsedHistory {
    let mut parsed = ParsedHistory::default();
    for (n, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == HEADER {
            continue;
        }
        match HistoryRecord::parse_line(trimmed) {
            Ok(r) => parsed.records.push(r),
            Err(e) => {
                debug!("HISTORY: line {} skipped: {e}", n + 1);
                parsed.skipped += 1;
            }
        }
    }
    parsed
}
