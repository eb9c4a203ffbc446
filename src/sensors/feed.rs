//! Inbound side of the sensing link.
//!
//! The link reader (a serial thread, a replay file, a test) pushes raw
//! readings here.  Invalid distances are rejected on the spot so they never
//! reach the cache; valid ones go through a bounded `embassy-sync` channel
//! to the ingest task.  When the channel is full the newest reading is
//! dropped; the cache already holds something recent.

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

use super::DistanceSample;
use crate::error::Result;

/// Channel depth for inbound samples.
pub const SAMPLE_DEPTH: usize = 16;

pub type SampleChannel = Channel<CriticalSectionRawMutex, DistanceSample, SAMPLE_DEPTH>;

/// Cloneable producer handle for distance readings.
#[derive(Clone)]
pub struct SampleFeed {
    channel: Arc<SampleChannel>,
}

impl Default for SampleFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleFeed {
    pub fn new() -> Self {
        Self {
            channel: Arc::new(Channel::new()),
        }
    }

    /// Validate and enqueue a reading.
    pub fn push(&self, distance_cm: f32, timestamp_ms: u64) -> Result<()> {
        let sample = match DistanceSample::new(distance_cm, timestamp_ms) {
            Ok(s) => s,
            Err(e) => {
                debug!("FEED: discarded {distance_cm} cm");
                return Err(e);
            }
        };
        if self.channel.try_send(sample).is_err() {
            warn!("FEED: sample channel full, dropping {distance_cm:.2} cm");
        }
        Ok(())
    }

    /// Classify one raw link line and push it if it carries a distance.
    /// Status lines are returned to the caller untouched.
    pub fn push_line(&self, line: &str, timestamp_ms: u64) -> LinkLine {
        let parsed = parse_link_line(line);
        if let LinkLine::Distance(d) = parsed {
            // Out-of-range readings were already logged by push.
            let _ = self.push(d, timestamp_ms);
        }
        parsed
    }

    /// Await the next sample.  Used by the ingest task.
    pub async fn receive(&self) -> DistanceSample {
        self.channel.receive().await
    }

    pub fn try_receive(&self) -> Option<DistanceSample> {
        self.channel.try_receive().ok()
    }

    pub fn pending(&self) -> usize {
        self.channel.len()
    }
}

// ---------------------------------------------------------------------------
// Link line classification
// ---------------------------------------------------------------------------

/// What a single text line from the sensing link carries.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkLine {
    /// A distance reading in cm (not yet range-checked).
    Distance(f32),
    /// The device finished booting.
    Ready,
    /// The device reported a fault; the text is dropped.
    Error,
    /// Anything else, e.g. debug chatter.
    Unknown,
}

/// Accepts a bare number (`"42.7"`), or a labelled reading
/// (`"Dist: 42.7 cm"`, `"Distância: 42.7 cm"`).
pub fn parse_link_line(line: &str) -> LinkLine {
    let line = line.trim();
    if line.is_empty() {
        return LinkLine::Unknown;
    }
    let upper = line.to_ascii_uppercase();
    if upper.starts_with("READY") {
        return LinkLine::Ready;
    }
    if upper.starts_with("ERR") {
        return LinkLine::Error;
    }
    if let Ok(v) = line.parse::<f32>() {
        return LinkLine::Distance(v);
    }
    distance_token(line).map_or(LinkLine::Unknown, LinkLine::Distance)
}

/// The number following a `Dist…:` label and preceding `cm`.
pub(crate) fn distance_token(line: &str) -> Option<f32> {
    let lower = line.to_ascii_lowercase();
    let start = lower.find("dist")?;
    let rest = &line[start..];
    let colon = rest.find(':')?;
    let value = rest[colon + 1..].trim_start();
    let end = value.find("cm")?;
    value[..end].trim().parse().ok()
}
