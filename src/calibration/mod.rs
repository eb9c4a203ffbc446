//! Offline recalibration from history logs.
//!
//! ```text
//!  history.csv ──parse──▶ records ──group by desired height──▶ per-group medians
//!                            │                                     │
//!                            ▼                                     ▼
//!                 10/25/50/75/90 quantiles               corrected power table
//!                 (distance, power)                       + mean tracking error
//!                            │                                     │
//!                            └──────────▶ CalibrationResult ◀──────┘
//! ```
//!
//! A result only carries what could be derived; the fuzzy controller keeps
//! its current value for every field left `None`.

pub mod history;
pub mod raw;

use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{CalibrationConfig, SystemConfig, TubeGeometry};
use crate::control::lookup::{LookupPoint, LookupTable};
use crate::control::membership::enforce_spacing;
use crate::error::{CalibrationDataError, Result};
use history::HistoryRecord;

/// Percentiles that become the five membership peaks.
pub const PEAK_QUANTILES: [f32; 5] = [0.10, 0.25, 0.50, 0.75, 0.90];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub records: usize,
    pub groups_used: usize,
    pub groups_dropped: usize,
    /// Mean of the per-group median tracking errors (cm).
    pub mean_error_cm: f32,
}

/// Everything a calibration run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub input_peaks: Option<[f32; 5]>,
    pub output_peaks: Option<[f32; 5]>,
    pub lookup: Option<LookupTable>,
    pub trim_gain: Option<f32>,
    pub report: CalibrationReport,
}

/// Per-desired-height summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupSummary {
    pub desired_height_cm: f32,
    pub samples: usize,
    pub median_distance_cm: f32,
    pub median_power_pct: f32,
    pub median_error_cm: f32,
    pub corrected_power_pct: f32,
}

pub struct Calibrator {
    config: CalibrationConfig,
    geometry: TubeGeometry,
    minimum_power: f32,
    breakpoint_gap: f32,
    power_gap: f32,
}

impl Calibrator {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            config: config.calibration.clone(),
            geometry: config.fuzzy.geometry,
            minimum_power: config.fuzzy.minimum_power_pct,
            breakpoint_gap: config.fuzzy.breakpoint_gap_cm,
            power_gap: config.fuzzy.power_gap_pct,
        }
    }

    pub fn calibrate(&self, records: &[HistoryRecord]) -> Result<CalibrationResult> {
        let min = self.config.min_group_samples.max(1);
        if records.len() < min {
            return Err(CalibrationDataError::InsufficientRecords.into());
        }

        let (groups, dropped) = self.summarize(records);
        if groups.is_empty() {
            return Err(CalibrationDataError::NoUsableGroups.into());
        }

        let points: Vec<LookupPoint> = groups
            .iter()
            .map(|g| LookupPoint {
                setpoint_cm: self.geometry.setpoint_for(g.desired_height_cm),
                power_pct: g.corrected_power_pct,
            })
            .collect();
        let lookup = match LookupTable::from_points(&points) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!("CALIB: lookup table not rebuilt: {e}");
                None
            }
        };

        let distances: Vec<f32> = records.iter().map(|r| r.distance_cm).collect();
        let powers: Vec<f32> = records.iter().map(|r| r.power_pct).collect();
        let input_peaks = quantile_peaks(&distances).map(|mut p| {
            enforce_spacing(&mut p, 0.0, self.geometry.distance_max(), self.breakpoint_gap);
            p
        });
        let output_peaks = quantile_peaks(&powers).map(|mut p| {
            enforce_spacing(&mut p, self.minimum_power, 100.0, self.power_gap);
            p
        });

        let mean_error =
            groups.iter().map(|g| g.median_error_cm).sum::<f32>() / groups.len() as f32;
        let gain = (self.config.base_gain + self.config.gain_per_cm * mean_error)
            .min(self.config.max_gain);

        let report = CalibrationReport {
            records: records.len(),
            groups_used: groups.len(),
            groups_dropped: dropped,
            mean_error_cm: mean_error,
        };
        info!(
            "CALIB | records={} groups={} dropped={} mean_err={:.2}cm gain={:.3}",
            report.records, report.groups_used, report.groups_dropped, mean_error, gain
        );

        Ok(CalibrationResult {
            input_peaks,
            output_peaks,
            lookup,
            trim_gain: Some(gain),
            report,
        })
    }

    /// Group by desired height (0.1 cm resolution) and summarize every group
    /// large enough to trust.  Returns the summaries and the dropped count.
    pub fn summarize(&self, records: &[HistoryRecord]) -> (Vec<GroupSummary>, usize) {
        let mut groups: BTreeMap<i32, Vec<&HistoryRecord>> = BTreeMap::new();
        for r in records {
            let key = (r.desired_height_cm * 10.0).round() as i32;
            groups.entry(key).or_default().push(r);
        }

        let mut dropped = 0;
        let mut out = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            if members.len() < self.config.min_group_samples {
                dropped += 1;
                continue;
            }
            out.push(self.summarize_group(key as f32 / 10.0, &members));
        }
        (out, dropped)
    }

    fn summarize_group(&self, desired: f32, members: &[&HistoryRecord]) -> GroupSummary {
        let column = |f: fn(&HistoryRecord) -> f32| -> Vec<f32> {
            members.iter().map(|r| f(r)).collect()
        };
        let median_distance = median(&column(|r| r.distance_cm)).unwrap_or(0.0);
        let median_power = median(&column(|r| r.power_pct)).unwrap_or(0.0);
        let median_error = median(&column(HistoryRecord::tracking_error)).unwrap_or(0.0);
        // Positive when the object sits below the target and needs more air.
        let shortfall = median(&column(|r| r.desired_height_cm - r.measured_height_cm))
            .unwrap_or(0.0);
        let direction = if shortfall > 0.0 {
            1.0
        } else if shortfall < 0.0 {
            -1.0
        } else {
            0.0
        };
        let corrected = (median_power + self.config.error_gain * median_error * direction)
            .clamp(self.config.power_floor_pct, self.config.power_ceiling_pct);
        GroupSummary {
            desired_height_cm: desired,
            samples: members.len(),
            median_distance_cm: median_distance,
            median_power_pct: median_power,
            median_error_cm: median_error,
            corrected_power_pct: corrected,
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

pub fn median(values: &[f32]) -> Option<f32> {
    quantile(values, 0.5)
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(values: &[f32], q: f32) -> Option<f32> {
    let mut sorted: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f32::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f32;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn quantile_peaks(values: &[f32]) -> Option<[f32; 5]> {
    let mut peaks = [0.0; 5];
    for (slot, q) in peaks.iter_mut().zip(PEAK_QUANTILES) {
        *slot = quantile(values, q)?;
    }
    Some(peaks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fsm::ControlMode;

    fn rec(desired: f32, measured: f32, distance: f32, power: f32) -> HistoryRecord {
        HistoryRecord {
            timestamp: heapless::String::try_from("2025-01-01T00:00:00.000").unwrap(),
            distance_cm: distance,
            measured_height_cm: measured,
            desired_height_cm: desired,
            power_pct: power,
            mode: ControlMode::Fuzzy,
        }
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&v, 0.5), Some(3.0));
        assert!((quantile(&v, 0.1).unwrap() - 1.4).abs() < 1e-5);
        assert_eq!(median(&[4.0, 1.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn too_few_records_is_an_error() {
        let cal = Calibrator::new(&SystemConfig::default());
        let rs = vec![rec(20.0, 20.0, 30.0, 50.0); 4];
        assert_eq!(
            cal.calibrate(&rs),
            Err(Error::CalibrationData(CalibrationDataError::InsufficientRecords))
        );
    }

    #[test]
    fn sparse_groups_are_dropped() {
        let cal = Calibrator::new(&SystemConfig::default());
        let mut rs: Vec<_> = (0..4).map(|_| rec(10.0, 10.0, 80.0, 40.0)).collect();
        rs.extend((0..3).map(|_| rec(30.0, 30.0, 60.0, 60.0)));
        assert_eq!(
            cal.calibrate(&rs),
            Err(Error::CalibrationData(CalibrationDataError::NoUsableGroups))
        );
    }

    #[test]
    fn object_below_target_raises_corrected_power() {
        let cal = Calibrator::new(&SystemConfig::default());
        let rs: Vec<_> = (0..5).map(|_| rec(30.0, 26.0, 70.0, 60.0)).collect();
        let (groups, dropped) = cal.summarize(&rs);
        assert_eq!(dropped, 0);
        // 60 + 0.5 * 4
        assert!((groups[0].corrected_power_pct - 62.0).abs() < 1e-4);
    }

    #[test]
    fn object_above_target_lowers_corrected_power_within_band() {
        let cal = Calibrator::new(&SystemConfig::default());
        let rs: Vec<_> = (0..5).map(|_| rec(30.0, 34.0, 62.0, 21.0)).collect();
        let (groups, _) = cal.summarize(&rs);
        assert_eq!(groups[0].corrected_power_pct, 20.0);
    }

    #[test]
    fn result_carries_monotonic_peaks_table_and_capped_gain() {
        let cal = Calibrator::new(&SystemConfig::default());
        let mut rs = Vec::new();
        for i in 0..6 {
            let jitter = i as f32 * 0.2;
            rs.push(rec(20.0, 19.0, 63.0 + jitter, 55.0 + jitter));
            rs.push(rec(40.0, 38.0, 43.0 + jitter, 68.0 + jitter));
        }
        let result = cal.calibrate(&rs).unwrap();
        assert_eq!(result.report.groups_used, 2);

        for peaks in [result.input_peaks.unwrap(), result.output_peaks.unwrap()] {
            for w in peaks.windows(2) {
                assert!(w[1] > w[0], "{peaks:?}");
            }
        }
        assert!(result.output_peaks.unwrap()[0] >= 10.0);

        let table = result.lookup.unwrap();
        assert_eq!(table.len(), 2);
        // Keys are setpoint distances, so the higher target sorts first.
        assert_eq!(table.points()[0].setpoint_cm, 102.0 - 43.0);

        // 0.3 + 0.05 * mean(1, 2)
        assert!((result.trim_gain.unwrap() - 0.375).abs() < 1e-4);
    }

    #[test]
    fn gain_is_capped() {
        let cal = Calibrator::new(&SystemConfig::default());
        let rs: Vec<_> = (0..5).map(|_| rec(30.0, 90.0, 10.0, 30.0)).collect();
        let result = cal.calibrate(&rs).unwrap();
        assert_eq!(result.trim_gain, Some(3.0));
    }
}
