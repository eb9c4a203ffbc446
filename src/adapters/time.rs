//! Host clock adapter.
//!
//! Monotonic time comes from `std::time::Instant`; history timestamps are
//! UTC wall time from `chrono`, formatted ISO-8601 with milliseconds.

use core::fmt::Write as _;
use std::time::Instant;

use chrono::{DateTime, Utc};
use heapless::String;

use crate::app::ports::Clock;
use crate::calibration::history::TIMESTAMP_LEN;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Clock for the host binary.  Copies share the same origin.
#[derive(Debug, Clone, Copy)]
pub struct HostClock {
    start: Instant,
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds since construction.
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Clock for HostClock {
    fn now_ms(&self) -> u64 {
        self.uptime_ms()
    }

    fn wall_time_iso(&self) -> String<TIMESTAMP_LEN> {
        format_iso(&Utc::now())
    }
}

/// `YYYY-MM-DDTHH:MM:SS.mmm`.
pub fn format_iso(at: &DateTime<Utc>) -> String<TIMESTAMP_LEN> {
    let mut out = String::new();
    // 23 characters for any four-digit year.
    let _ = write!(out, "{}", at.format(ISO_FORMAT));
    out
}

/// [`format_iso`] for milliseconds since the Unix epoch.  Out-of-range
/// values format as the epoch.
pub fn format_unix_ms(unix_ms: i64) -> String<TIMESTAMP_LEN> {
    format_iso(&DateTime::from_timestamp_millis(unix_ms).unwrap_or_default())
}
