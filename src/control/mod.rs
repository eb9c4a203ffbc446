//! Control laws: fuzzy inference and proportional with deadband.
//!
//! Both controllers map a distance reading (cm) to a fan power (%).  The
//! arbiter drives them through the [`Controller`] trait so that a fault in
//! either one surfaces as an [`Error`] rather than a panic.

pub mod fuzzy;
pub mod lookup;
pub mod membership;
pub mod proportional;
pub mod rules;
pub mod smoothing;

pub use fuzzy::{FuzzyController, InferenceStrategy};
pub use lookup::{LookupPoint, LookupTable};
pub use proportional::ProportionalController;

use crate::error::{Error, Result};

/// A control law the arbiter can run each tick.
pub trait Controller {
    /// Power for `distance`, in `[0, 100]`.
    fn compute(&mut self, distance: f32) -> Result<f32>;

    fn set_desired_height(&mut self, height: f32);

    fn setpoint(&self) -> f32;
}

impl Controller for FuzzyController {
    fn compute(&mut self, distance: f32) -> Result<f32> {
        if !distance.is_finite() {
            return Err(Error::InvalidSample);
        }
        Ok(self.evaluate(distance))
    }

    fn set_desired_height(&mut self, height: f32) {
        FuzzyController::set_desired_height(self, height);
    }

    fn setpoint(&self) -> f32 {
        FuzzyController::setpoint(self)
    }
}

impl Controller for ProportionalController {
    fn compute(&mut self, distance: f32) -> Result<f32> {
        if !distance.is_finite() {
            return Err(Error::InvalidSample);
        }
        Ok(self.evaluate(distance))
    }

    fn set_desired_height(&mut self, height: f32) {
        ProportionalController::set_desired_height(self, height);
    }

    fn setpoint(&self) -> f32 {
        ProportionalController::setpoint(self)
    }
}
