//! Distance samples and the state shared between the ingest task and the
//! control tick.
//!
//! ```text
//!  SampleFeed ──channel──▶ ingest task ──publish──▶ SampleCache ◀── tick
//!                                                    (single slot)
//!  tick ──store──▶ PowerMonitor ◀── any thread
//! ```
//!
//! Both shared slots are swapped whole: a reader sees either the old pair
//! or the new pair, never a mix.

pub mod feed;

pub use feed::{LinkLine, SampleFeed, parse_link_line};

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::error::{Error, Result};

/// Largest distance the rangefinder reports as valid (cm).
pub const MAX_VALID_DISTANCE_CM: f32 = 400.0;

/// One accepted rangefinder reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSample {
    pub distance_cm: f32,
    /// Monotonic uptime at which the reading arrived (ms).
    pub timestamp_ms: u64,
}

impl DistanceSample {
    /// Validate a reading; anything outside `(0, 400]` is rejected.
    pub fn new(distance_cm: f32, timestamp_ms: u64) -> Result<Self> {
        if !(distance_cm > 0.0 && distance_cm <= MAX_VALID_DISTANCE_CM) {
            return Err(Error::InvalidSample);
        }
        Ok(Self {
            distance_cm,
            timestamp_ms,
        })
    }

    /// Age relative to `now_ms`; zero if the sample is from the future.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp_ms)
    }
}

// ---------------------------------------------------------------------------
// Freshness cache
// ---------------------------------------------------------------------------

/// Last accepted sample.  Single writer (ingest), single reader (tick).
pub struct SampleCache {
    slot: Mutex<CriticalSectionRawMutex, Cell<Option<DistanceSample>>>,
}

impl Default for SampleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleCache {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(None)),
        }
    }

    pub fn publish(&self, sample: DistanceSample) {
        self.slot.lock(|c| c.set(Some(sample)));
    }

    pub fn latest(&self) -> Option<DistanceSample> {
        self.slot.lock(Cell::get)
    }

    /// Latest sample if it is younger than `max_age_ms`.
    pub fn fresh(&self, now_ms: u64, max_age_ms: u64) -> Result<DistanceSample> {
        match self.latest() {
            Some(s) if s.distance_cm > 0.0 && s.age_ms(now_ms) < max_age_ms => Ok(s),
            _ => Err(Error::StaleInput),
        }
    }

    pub fn clear(&self) {
        self.slot.lock(|c| c.set(None));
    }
}

// ---------------------------------------------------------------------------
// Last dispatched power
// ---------------------------------------------------------------------------

/// `u32::MAX` is a NaN bit pattern no caller stores, so it marks "none".
const NO_POWER: u32 = u32::MAX;

/// Last power the actuation link accepted, readable from any thread.
#[derive(Debug, Clone)]
pub struct PowerMonitor {
    bits: Arc<AtomicU32>,
}

impl Default for PowerMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerMonitor {
    pub fn new() -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(NO_POWER)),
        }
    }

    pub fn store(&self, power: f32) {
        if power.is_finite() {
            self.bits.store(power.to_bits(), Ordering::Release);
        }
    }

    pub fn load(&self) -> Option<f32> {
        match self.bits.load(Ordering::Acquire) {
            NO_POWER => None,
            bits => Some(f32::from_bits(bits)),
        }
    }
}
