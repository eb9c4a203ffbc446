//! Fuzzy fan controller.
//!
//! ```text
//!  distance ─▶ clip ─▶ ┌──────────────────────┐ ─▶ + trim ─▶ clip 0..100
//!                      │ InferenceStrategy    │            │
//!                      │  Mamdani: centroid   │            ▼
//!                      │  Lookup:  table(sp)  │      ExpSmoother
//!                      └──────────────────────┘            │
//!                                                          ▼
//!                                               max(out, minimum_power)
//! ```
//!
//! Any undefined intermediate (empty aggregate, non-finite result, empty
//! lookup table) yields the configured fallback power.  Smoothing memory
//! is untouched on fallback so the next good tick continues from the last
//! good output.

use log::debug;

use super::lookup::LookupTable;
use super::membership::{InputCategory, OutputCategory, Universe, UniverseKind};
use super::rules::{RULE_BASE, RuleSet};
use super::smoothing::ExpSmoother;
use crate::calibration::CalibrationResult;
use crate::config::{FuzzyConfig, StrategyKind, TubeGeometry};
use crate::error::{Error, Result};

/// Output universe is sampled at every whole percent.
const CENTROID_STEPS: u32 = 100;
const CENTROID_EPSILON: f32 = 1e-6;

/// How the controller turns a distance into a raw power.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceStrategy {
    /// Min implication, max aggregation, centroid defuzzification.
    Mamdani,
    /// Interpolate the calibrated table at the current setpoint.
    LookupCorrection(LookupTable),
}

impl InferenceStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Mamdani => StrategyKind::Mamdani,
            Self::LookupCorrection(_) => StrategyKind::LookupCorrection,
        }
    }
}

pub struct FuzzyController {
    geometry: TubeGeometry,
    strategy: InferenceStrategy,
    inputs: Universe<InputCategory>,
    outputs: Universe<OutputCategory>,
    rules: RuleSet,
    smoother: ExpSmoother,
    minimum_power: f32,
    trim_gain: f32,
    lookup_offset: f32,
    fallback_power: f32,
    breakpoint_gap: f32,
    power_gap: f32,
    desired_height: f32,
    setpoint: f32,
    fallbacks: u32,
    last_raw: Option<f32>,
}

impl FuzzyController {
    /// Build from config, installing any saved calibration.  The lookup path
    /// starts with the saved table, or an empty one that falls back until a
    /// recalibration supplies points.
    pub fn new(config: &FuzzyConfig, desired_height: f32) -> Self {
        let strategy = match config.strategy {
            StrategyKind::Mamdani => InferenceStrategy::Mamdani,
            StrategyKind::LookupCorrection => InferenceStrategy::LookupCorrection(
                config
                    .calibrated
                    .as_ref()
                    .and_then(|c| c.lookup.clone())
                    .unwrap_or_default(),
            ),
        };
        let mut controller = Self::with_strategy(config, desired_height, strategy);
        if let Some(saved) = &config.calibrated {
            controller.apply_calibration(saved);
        }
        controller
    }

    pub fn with_strategy(
        config: &FuzzyConfig,
        desired_height: f32,
        strategy: InferenceStrategy,
    ) -> Self {
        let geometry = config.geometry;
        let minimum_power = config.minimum_power_pct.clamp(0.0, 100.0);
        let desired_height = geometry.clamp_height(desired_height);
        let setpoint = geometry.setpoint_for(desired_height);
        let inputs =
            Universe::for_setpoint(setpoint, geometry.distance_max(), config.breakpoint_gap_cm);
        let outputs = Universe::standard_power(minimum_power, config.power_gap_pct);
        let rules = RuleSet::compile(&RULE_BASE, &inputs, &outputs);
        Self {
            geometry,
            strategy,
            inputs,
            outputs,
            rules,
            smoother: ExpSmoother::new(config.smoothing_alpha),
            minimum_power,
            trim_gain: config.trim_gain,
            lookup_offset: config.lookup_offset_pct,
            fallback_power: config.fallback_power_pct,
            breakpoint_gap: config.breakpoint_gap_cm,
            power_gap: config.power_gap_pct,
            desired_height,
            setpoint,
            fallbacks: 0,
            last_raw: None,
        }
    }

    /// Power for `distance`, always within `[minimum_power, 100]`.
    pub fn evaluate(&mut self, distance: f32) -> f32 {
        match self.raw_output(distance) {
            Ok(raw) => {
                self.last_raw = Some(raw);
                let out = self.smoother.apply(raw).max(self.minimum_power);
                self.smoother.prime(out);
                out
            }
            Err(e) => {
                self.fallbacks = self.fallbacks.wrapping_add(1);
                debug!(
                    "FUZZY: {e} at {distance:.2} cm, using fallback {:.1}%",
                    self.fallback_power
                );
                self.fallback_power.max(self.minimum_power).min(100.0)
            }
        }
    }

    /// Clipped pre-smoothing power for `distance`.  Pure.
    pub fn raw_output(&self, distance: f32) -> Result<f32> {
        if !distance.is_finite() {
            return Err(Error::InferenceFailure);
        }
        let d = distance.clamp(0.0, self.geometry.distance_max());
        let trim = self.trim_gain * (d - self.setpoint);
        let raw = match &self.strategy {
            InferenceStrategy::Mamdani => self.centroid(d)? + trim,
            InferenceStrategy::LookupCorrection(table) => {
                let base = table
                    .interpolate(self.setpoint)
                    .ok_or(Error::InferenceFailure)?;
                base + trim + self.lookup_offset
            }
        };
        if !raw.is_finite() {
            return Err(Error::InferenceFailure);
        }
        Ok(raw.clamp(0.0, 100.0))
    }

    fn centroid(&self, d: f32) -> Result<f32> {
        let firing = self.rules.firing(d);
        let mut num = 0.0_f32;
        let mut den = 0.0_f32;
        for step in 0..=CENTROID_STEPS {
            let x = step as f32;
            let mu = self.rules.aggregate(&firing, x);
            num += x * mu;
            den += mu;
        }
        if den <= CENTROID_EPSILON {
            debug!("FUZZY: empty aggregate for d={d:.2}, firing={firing:?}");
            return Err(Error::InferenceFailure);
        }
        Ok(num / den)
    }

    /// Clamp `height`, derive the new setpoint and rebuild the distance sets
    /// and rules around it.  Smoothing memory is kept.
    pub fn set_desired_height(&mut self, height: f32) {
        self.desired_height = self.geometry.clamp_height(height);
        self.setpoint = self.geometry.setpoint_for(self.desired_height);
        self.inputs = Universe::for_setpoint(
            self.setpoint,
            self.geometry.distance_max(),
            self.breakpoint_gap,
        );
        self.rebuild_rules();
    }

    /// Install a calibration result.  Fields the result leaves empty keep
    /// their current value; the table is only used on the lookup path.
    pub fn apply_calibration(&mut self, result: &CalibrationResult) {
        if let Some(peaks) = result.input_peaks {
            self.inputs = Universe::from_peaks(
                peaks,
                0.0,
                self.geometry.distance_max(),
                self.breakpoint_gap,
                UniverseKind::Input,
            );
        }
        if let Some(peaks) = result.output_peaks {
            self.outputs = Universe::from_peaks(
                peaks,
                self.minimum_power,
                100.0,
                self.power_gap,
                UniverseKind::Output,
            );
        }
        if let Some(table) = &result.lookup {
            if let InferenceStrategy::LookupCorrection(current) = &mut self.strategy {
                *current = table.clone();
            }
        }
        if let Some(gain) = result.trim_gain {
            if gain.is_finite() {
                self.trim_gain = gain.max(0.0);
            }
        }
        self.rebuild_rules();
    }

    fn rebuild_rules(&mut self) {
        self.rules = RuleSet::compile(&RULE_BASE, &self.inputs, &self.outputs);
    }

    /// Seed the smoothing memory, e.g. with the power in effect when the
    /// controller takes over.
    pub fn prime(&mut self, value: f32) {
        self.smoother.prime(value.clamp(0.0, 100.0));
    }

    pub fn reset_smoothing(&mut self) {
        self.smoother.reset();
    }

    pub fn setpoint(&self) -> f32 {
        self.setpoint
    }

    pub fn geometry(&self) -> &TubeGeometry {
        &self.geometry
    }

    pub fn desired_height(&self) -> f32 {
        self.desired_height
    }

    pub fn input_breakpoints(&self) -> [[f32; 3]; 5] {
        self.inputs.breakpoints()
    }

    pub fn output_breakpoints(&self) -> [[f32; 3]; 5] {
        self.outputs.breakpoints()
    }

    pub fn trim_gain(&self) -> f32 {
        self.trim_gain
    }

    pub fn minimum_power(&self) -> f32 {
        self.minimum_power
    }

    /// Number of evaluations answered with the fallback power.
    pub fn fallback_count(&self) -> u32 {
        self.fallbacks
    }

    /// Clipped raw power of the last successful evaluation.
    pub fn last_raw(&self) -> Option<f32> {
        self.last_raw
    }

    pub fn last_output(&self) -> Option<f32> {
        self.smoother.previous()
    }

    pub fn strategy(&self) -> &InferenceStrategy {
        &self.strategy
    }

    pub fn lookup(&self) -> Option<&LookupTable> {
        match &self.strategy {
            InferenceStrategy::LookupCorrection(t) => Some(t),
            InferenceStrategy::Mamdani => None,
        }
    }
}
