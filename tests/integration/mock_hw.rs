//! Mock adapters for integration tests.
//!
//! Records every actuation call so tests can assert on the full command
//! history without a real serial link.

use std::cell::Cell;
use std::sync::{Arc, Mutex};

use levitator::app::events::ArbiterEvent;
use levitator::app::ports::{ActuationLink, Clock, EventSink, HistorySink};
use levitator::calibration::history::{HistoryRecord, TIMESTAMP_LEN};
use levitator::error::Error;

// ── MockLink ──────────────────────────────────────────────────

/// Records every `send_power` call, accepted or not.
#[derive(Default)]
pub struct MockLink {
    pub calls: Vec<f32>,
    pub accepted: Vec<f32>,
    pub failing: bool,
}

#[allow(dead_code)]
impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_accepted(&self) -> Option<f32> {
        self.accepted.last().copied()
    }
}

impl ActuationLink for MockLink {
    fn send_power(&mut self, power_pct: f32) -> Result<(), Error> {
        self.calls.push(power_pct);
        if self.failing {
            return Err(Error::ActuationLinkUnavailable);
        }
        self.accepted.push(power_pct);
        Ok(())
    }
}

/// Thread-safe variant for tests that hand the link to the control thread.
#[derive(Clone, Default)]
pub struct SharedLink {
    pub accepted: Arc<Mutex<Vec<f32>>>,
}

#[allow(dead_code)]
impl SharedLink {
    pub fn snapshot(&self) -> Vec<f32> {
        self.accepted.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl ActuationLink for SharedLink {
    fn send_power(&mut self, power_pct: f32) -> Result<(), Error> {
        if let Ok(mut v) = self.accepted.lock() {
            v.push(power_pct);
        }
        Ok(())
    }
}

// ── MockClock ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockClock {
    pub now: Cell<u64>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn at(ms: u64) -> Self {
        Self { now: Cell::new(ms) }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn wall_time_iso(&self) -> heapless::String<TIMESTAMP_LEN> {
        let mut s = heapless::String::new();
        let _ = core::fmt::Write::write_fmt(
            &mut s,
            format_args!("2025-01-01T00:00:{:06.3}", self.now.get() as f64 / 1000.0),
        );
        s
    }
}

// ── RecordingHistory ──────────────────────────────────────────

#[derive(Default)]
pub struct RecordingHistory {
    pub records: Vec<HistoryRecord>,
}

impl HistorySink for RecordingHistory {
    fn record(&mut self, record: &HistoryRecord) {
        self.records.push(record.clone());
    }
}

// ── LogSink ───────────────────────────────────────────────────

/// Event sink that stores every event.
#[derive(Default)]
pub struct LogSink {
    pub events: Vec<ArbiterEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&ArbiterEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &ArbiterEvent) {
        self.events.push(event.clone());
    }
}
