//! Raw sweep-log conversion.
//!
//! The open-loop sweep firmware prints lines like
//!
//! ```text
//! PWM: 100, Medida 101: Distância: 42.65 cm
//! PWM ajustado para 120
//! ```
//!
//! Conversion keeps `(pwm, distance)` pairs, drops PWM readings above the
//! saturation limit, then runs a spike filter: the first sample is always
//! kept and every later one must sit within `delta_max_cm` of the last
//! kept sample.

use core::fmt::Write as _;

use log::{debug, info};

use crate::config::SpikeFilterConfig;
use crate::sensors::feed::distance_token;

/// Lines containing this marker echo a PWM change, not a measurement.
const ADJUSTED_MARKER: &str = "PWM ajustado";

pub const CSV_HEADER: &str = "pwm,distance_cm";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub pwm: u16,
    pub distance_cm: f32,
}

/// Counters from one conversion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Lines that carried a `(pwm, distance)` pair.
    pub parsed: usize,
    /// Pairs dropped for exceeding the PWM limit.
    pub saturated: usize,
    /// Pairs dropped by the spike filter.
    pub spikes: usize,
}

/// Extract `(pwm, distance)` from one log line.
pub fn parse_raw_line(line: &str) -> Option<RawSample> {
    if line.contains(ADJUSTED_MARKER) {
        return None;
    }
    let after = &line[line.find("PWM:")? + 4..];
    let digits: &str = {
        let trimmed = after.trim_start();
        let end = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        &trimmed[..end]
    };
    let pwm = digits.parse().ok()?;
    let distance_cm = distance_token(line)?;
    distance_cm.is_finite().then_some(RawSample { pwm, distance_cm })
}

/// Keep the first sample, then only those within `delta_max` of the last
/// kept one.
pub fn remove_spikes(samples: &[RawSample], delta_max: f32) -> Vec<RawSample> {
    let mut kept: Vec<RawSample> = Vec::with_capacity(samples.len());
    for &s in samples {
        match kept.last() {
            Some(prev) if (s.distance_cm - prev.distance_cm).abs() > delta_max => {
                debug!(
                    "RAW: spike removed {:.2} cm (delta {:.2})",
                    s.distance_cm,
                    s.distance_cm - prev.distance_cm
                );
            }
            _ => kept.push(s),
        }
    }
    kept
}

/// Full pipeline: parse, saturation filter, spike filter.
pub fn parse_raw_log(text: &str, filter: &SpikeFilterConfig) -> (Vec<RawSample>, ConversionReport) {
    let mut report = ConversionReport::default();
    let parsed: Vec<RawSample> = text.lines().filter_map(parse_raw_line).collect();
    report.parsed = parsed.len();

    let unsaturated: Vec<RawSample> = parsed
        .into_iter()
        .filter(|s| s.pwm <= filter.max_pwm)
        .collect();
    report.saturated = report.parsed - unsaturated.len();

    let kept = remove_spikes(&unsaturated, filter.delta_max_cm);
    report.spikes = unsaturated.len() - kept.len();

    info!(
        "RAW: {} parsed, {} saturated, {} spikes, {} kept",
        report.parsed,
        report.saturated,
        report.spikes,
        kept.len()
    );
    (kept, report)
}

/// `pwm,distance_cm` CSV with a header line.
pub fn to_csv(samples: &[RawSample]) -> String {
    let mut out = String::with_capacity(16 + samples.len() * 12);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for s in samples {
        let _ = writeln!(out, "{},{:.2}", s.pwm, s.distance_cm);
    }
    out
}
