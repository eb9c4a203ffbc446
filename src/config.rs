//! System configuration parameters
//!
//! All tunable parameters for the levitation controller.
//! Values can be overridden from a JSON file (see
//! [`adapters::config_file`](crate::adapters::config_file)) or replaced at
//! runtime by calibration.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationResult;
use crate::error::{Error, Result};
use crate::fsm::ControlMode;

/// Smallest distance setpoint a desired height may map to (cm).
const MIN_SETPOINT_CM: f32 = 1.0;

/// Physical layout of the tube, rangefinder, and floating object.
///
/// The rangefinder looks down from above the tube, so a larger distance
/// means the object sits lower and needs more fan power.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TubeGeometry {
    /// Usable tube height (cm).
    pub tube_height_cm: f32,
    /// Height of the rangefinder mount above the tube top (cm).
    pub sensor_height_cm: f32,
    /// Radius of the floating object (cm).
    pub object_radius_cm: f32,
}

impl TubeGeometry {
    /// Largest distance the rangefinder can report inside the tube.
    pub fn distance_max(&self) -> f32 {
        self.tube_height_cm + self.sensor_height_cm
    }

    /// Highest reachable object height that still maps to a positive setpoint.
    pub fn max_height(&self) -> f32 {
        (self.distance_max() - self.object_radius_cm - MIN_SETPOINT_CM).max(0.0)
    }

    /// Clamp an operator-supplied height to what the tube can hold.
    pub fn clamp_height(&self, height_cm: f32) -> f32 {
        if height_cm.is_nan() {
            return 0.0;
        }
        height_cm.clamp(0.0, self.max_height())
    }

    /// Distance the rangefinder reads when the object sits at `height_cm`.
    pub fn setpoint_for(&self, height_cm: f32) -> f32 {
        self.distance_max() - (self.clamp_height(height_cm) + self.object_radius_cm)
    }

    /// Object height implied by a distance reading.
    pub fn height_for_distance(&self, distance_cm: f32) -> f32 {
        self.distance_max() - distance_cm - self.object_radius_cm
    }
}

/// Which output stage the fuzzy controller is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Mamdani min/max inference with centroid defuzzification.
    Mamdani,
    /// Calibrated height→power table plus proportional trim.
    LookupCorrection,
}

/// Fuzzy controller tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyConfig {
    pub geometry: TubeGeometry,
    pub strategy: StrategyKind,
    /// Floor applied to every output (0-100%).
    pub minimum_power_pct: f32,
    /// Exponential smoothing factor for the newest value (0 < α ≤ 1).
    pub smoothing_alpha: f32,
    /// Proportional trim added to the inferred power (% per cm of error).
    pub trim_gain: f32,
    /// Constant added on the lookup-correction path (%).
    pub lookup_offset_pct: f32,
    /// Power returned when inference cannot produce a value (%).
    pub fallback_power_pct: f32,
    /// Minimum spacing between adjacent distance peaks (cm).
    pub breakpoint_gap_cm: f32,
    /// Minimum spacing between adjacent power peaks (%).
    pub power_gap_pct: f32,
    /// Last saved calibration, installed when the controller is built.
    /// Its trim gain takes precedence over `trim_gain`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibrated: Option<CalibrationResult>,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            geometry: TubeGeometry {
                tube_height_cm: 100.0,
                sensor_height_cm: 2.0,
                object_radius_cm: 3.0,
            },
            strategy: StrategyKind::Mamdani,
            minimum_power_pct: 10.0,
            smoothing_alpha: 0.3,
            trim_gain: 0.2,
            lookup_offset_pct: 0.0,
            fallback_power_pct: 55.0,
            breakpoint_gap_cm: 0.5,
            power_gap_pct: 1.0,
            calibrated: None,
        }
    }
}

/// Proportional controller tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProportionalConfig {
    pub geometry: TubeGeometry,
    /// Gain (% per cm of distance error).
    pub kp: f32,
    /// Power held at zero error (%).
    pub base_offset_pct: f32,
    /// Error band around the setpoint with no corrective action (cm).
    pub deadband_cm: f32,
}

impl Default for ProportionalConfig {
    fn default() -> Self {
        Self {
            geometry: TubeGeometry {
                tube_height_cm: 50.0,
                sensor_height_cm: 2.0,
                object_radius_cm: 2.0,
            },
            kp: 2.0,
            base_offset_pct: 57.0,
            deadband_cm: 1.0,
        }
    }
}

/// Arbiter timing and dispatch behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterConfig {
    pub initial_mode: ControlMode,
    /// Object height requested at startup (cm).
    pub initial_height_cm: f32,
    /// Control tick period (ms).
    pub control_period_ms: u32,
    /// Maximum age of a cached sample still used by a tick (ms).
    pub staleness_ms: u32,
    /// Smallest change in power worth sending to the link (%).
    pub hysteresis_pct: f32,
    /// Minimum spacing between history log records (ms).
    pub log_interval_ms: u32,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            initial_mode: ControlMode::Manual,
            initial_height_cm: 20.0,
            control_period_ms: 50, // 20 Hz
            staleness_ms: 800,
            hysteresis_pct: 0.1,
            log_interval_ms: 100,
        }
    }
}

/// Offline recalibration from history logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Groups with fewer samples are treated as noise and dropped.
    pub min_group_samples: usize,
    /// Power nudge per cm of median tracking error (%).
    pub error_gain: f32,
    /// Corrected powers are capped to this band (%).
    pub power_floor_pct: f32,
    pub power_ceiling_pct: f32,
    /// Trim gain = base + per_cm × mean tracking error, capped at max.
    pub base_gain: f32,
    pub gain_per_cm: f32,
    pub max_gain: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_group_samples: 5,
            error_gain: 0.5,
            power_floor_pct: 20.0,
            power_ceiling_pct: 95.0,
            base_gain: 0.3,
            gain_per_cm: 0.05,
            max_gain: 3.0,
        }
    }
}

/// Raw sweep-log cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpikeFilterConfig {
    /// PWM readings above this are saturation artifacts (0-255 scale).
    pub max_pwm: u16,
    /// Largest jump between consecutive kept distances (cm).
    pub delta_max_cm: f32,
}

impl Default for SpikeFilterConfig {
    fn default() -> Self {
        Self {
            max_pwm: 240,
            delta_max_cm: 5.0,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    pub fuzzy: FuzzyConfig,
    pub proportional: ProportionalConfig,
    pub arbiter: ArbiterConfig,
    pub calibration: CalibrationConfig,
    pub spike_filter: SpikeFilterConfig,
}

impl SystemConfig {
    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<()> {
        validate_geometry(&self.fuzzy.geometry)?;
        validate_geometry(&self.proportional.geometry)?;

        let f = &self.fuzzy;
        if !(0.0..=50.0).contains(&f.minimum_power_pct) {
            return Err(Error::Config("minimum_power_pct must be 0–50"));
        }
        if !(f.smoothing_alpha > 0.0 && f.smoothing_alpha <= 1.0) {
            return Err(Error::Config("smoothing_alpha must be in (0, 1]"));
        }
        if !(0.0..=10.0).contains(&f.trim_gain) {
            return Err(Error::Config("trim_gain must be 0–10"));
        }
        if !(-50.0..=50.0).contains(&f.lookup_offset_pct) {
            return Err(Error::Config("lookup_offset_pct must be -50–50"));
        }
        if !(0.0..=100.0).contains(&f.fallback_power_pct) {
            return Err(Error::Config("fallback_power_pct must be 0–100"));
        }
        if !(f.breakpoint_gap_cm > 0.0 && f.breakpoint_gap_cm * 4.0 < f.geometry.distance_max()) {
            return Err(Error::Config("breakpoint_gap_cm must fit four times in the tube"));
        }
        if !(f.power_gap_pct > 0.0 && f.minimum_power_pct + f.power_gap_pct * 4.0 <= 100.0) {
            return Err(Error::Config("power_gap_pct must fit four times above minimum power"));
        }
        if let Some(cal) = &f.calibrated {
            validate_calibration(cal)?;
        }

        let p = &self.proportional;
        if !(0.0..=20.0).contains(&p.kp) {
            return Err(Error::Config("kp must be 0–20"));
        }
        if !(0.0..=100.0).contains(&p.base_offset_pct) {
            return Err(Error::Config("base_offset_pct must be 0–100"));
        }
        if !(0.0..=20.0).contains(&p.deadband_cm) {
            return Err(Error::Config("deadband_cm must be 0–20"));
        }

        let a = &self.arbiter;
        if !(10..=1000).contains(&a.control_period_ms) {
            return Err(Error::Config("control_period_ms must be 10–1000"));
        }
        if a.staleness_ms <= a.control_period_ms {
            return Err(Error::Config("staleness_ms must exceed control_period_ms"));
        }
        if !(0.0..=10.0).contains(&a.hysteresis_pct) {
            return Err(Error::Config("hysteresis_pct must be 0–10"));
        }
        if a.log_interval_ms == 0 {
            return Err(Error::Config("log_interval_ms must be positive"));
        }

        let c = &self.calibration;
        if c.min_group_samples == 0 {
            return Err(Error::Config("min_group_samples must be positive"));
        }
        if !(c.power_floor_pct >= 0.0
            && c.power_floor_pct < c.power_ceiling_pct
            && c.power_ceiling_pct <= 100.0)
        {
            return Err(Error::Config("power floor/ceiling must satisfy 0 ≤ floor < ceiling ≤ 100"));
        }
        if !(c.base_gain >= 0.0 && c.gain_per_cm >= 0.0 && c.base_gain <= c.max_gain) {
            return Err(Error::Config("gain parameters must be non-negative with base ≤ max"));
        }

        let s = &self.spike_filter;
        if s.max_pwm == 0 || s.max_pwm > 255 {
            return Err(Error::Config("max_pwm must be 1–255"));
        }
        if s.delta_max_cm <= 0.0 {
            return Err(Error::Config("delta_max_cm must be positive"));
        }
        Ok(())
    }
}

fn validate_calibration(cal: &CalibrationResult) -> Result<()> {
    let peaks_ok = |p: &Option<[f32; 5]>| {
        p.is_none_or(|p| p.iter().all(|v| v.is_finite()) && p.windows(2).all(|w| w[0] < w[1]))
    };
    if !peaks_ok(&cal.input_peaks) || !peaks_ok(&cal.output_peaks) {
        return Err(Error::Config("calibrated peaks must be finite and strictly increasing"));
    }
    if !cal.trim_gain.is_none_or(|g| (0.0..=10.0).contains(&g)) {
        return Err(Error::Config("calibrated trim_gain must be 0–10"));
    }
    Ok(())
}

fn validate_geometry(g: &TubeGeometry) -> Result<()> {
    if !(10.0..=400.0).contains(&g.tube_height_cm) {
        return Err(Error::Config("tube_height_cm must be 10–400"));
    }
    if !(0.0..=50.0).contains(&g.sensor_height_cm) {
        return Err(Error::Config("sensor_height_cm must be 0–50"));
    }
    if !(g.object_radius_cm > 0.0 && g.object_radius_cm < g.tube_height_cm / 2.0) {
        return Err(Error::Config("object_radius_cm must be positive and under half the tube"));
    }
    Ok(())
}
