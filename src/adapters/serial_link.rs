//! Line-oriented actuation link.
//!
//! The fan controller on the other end of the link expects one
//! `PWM <0-255>` line per command.  [`WriterLink`] turns a power percentage
//! into that line on any `io::Write` (a serial port opened as a file, a
//! pipe, stdout, a `Vec<u8>` in tests).
//!
//! The read side lives in [`LinkReader`]: it pulls lines from any
//! `BufRead`, classifies them with [`parse_link_line`] and pushes distances
//! into a [`SampleFeed`].

use std::io::{BufRead, Write};

use log::{debug, info, warn};

use crate::app::ports::{ActuationLink, Clock};
use crate::error::Error;
use crate::sensors::{LinkLine, SampleFeed};

/// Full-scale PWM value on the link.
pub const PWM_MAX: u16 = 255;

/// `0–100 %` to the link's `0–255` scale, rounded.
pub fn power_to_pwm(power_pct: f32) -> u16 {
    if !power_pct.is_finite() {
        return 0;
    }
    (power_pct.clamp(0.0, 100.0) * f32::from(PWM_MAX) / 100.0).round() as u16
}

/// Writes `PWM n` lines to an underlying writer.
pub struct WriterLink<W: Write> {
    writer: W,
    sent: u64,
    failures: u64,
}

impl<W: Write> WriterLink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            sent: 0,
            failures: 0,
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ActuationLink for WriterLink<W> {
    fn send_power(&mut self, power_pct: f32) -> Result<(), Error> {
        let pwm = power_to_pwm(power_pct);
        let res = writeln!(self.writer, "PWM {pwm}").and_then(|()| self.writer.flush());
        match res {
            Ok(()) => {
                self.sent += 1;
                debug!("LINK | pwm={pwm} power={power_pct:.2}%");
                Ok(())
            }
            Err(e) => {
                self.failures += 1;
                if self.failures == 1 {
                    warn!("LINK | write failed: {e}");
                }
                Err(Error::ActuationLinkUnavailable)
            }
        }
    }
}

/// Counters from a [`LinkReader`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub distances: u64,
    pub status: u64,
    pub unknown: u64,
}

/// Pulls lines from the link and feeds distance readings onward.
pub struct LinkReader<R: BufRead> {
    reader: R,
    feed: SampleFeed,
    stats: ReaderStats,
}

impl<R: BufRead> LinkReader<R> {
    pub fn new(reader: R, feed: SampleFeed) -> Self {
        Self {
            reader,
            feed,
            stats: ReaderStats::default(),
        }
    }

    /// Read one line.  `Ok(None)` at end of input.
    pub fn poll(&mut self, clock: &impl Clock) -> std::io::Result<Option<LinkLine>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let parsed = self.feed.push_line(&line, clock.now_ms());
        match parsed {
            LinkLine::Distance(_) => self.stats.distances += 1,
            LinkLine::Ready => {
                self.stats.status += 1;
                info!("LINK | sensor ready");
            }
            LinkLine::Error => {
                self.stats.status += 1;
                warn!("LINK | sensor reported an error");
            }
            LinkLine::Unknown => self.stats.unknown += 1,
        }
        Ok(Some(parsed))
    }

    /// Read until end of input.
    pub fn run(&mut self, clock: &impl Clock) -> std::io::Result<ReaderStats> {
        while self.poll(clock)?.is_some() {}
        Ok(self.stats)
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }
}
