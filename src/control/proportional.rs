//! Proportional fan controller with a deadband.
//!
//! `power = base + kp * (distance - setpoint)`, clamped to 0–100%.  Inside
//! the deadband the error is treated as zero and the base offset is
//! returned unchanged.

use crate::config::{ProportionalConfig, TubeGeometry};

#[derive(Debug, Clone)]
pub struct ProportionalController {
    geometry: TubeGeometry,
    kp: f32,
    base_offset: f32,
    deadband: f32,
    desired_height: f32,
    setpoint: f32,
}

impl ProportionalController {
    pub fn new(config: &ProportionalConfig, desired_height: f32) -> Self {
        let mut c = Self {
            geometry: config.geometry,
            kp: config.kp,
            base_offset: config.base_offset_pct,
            deadband: config.deadband_cm.max(0.0),
            desired_height: 0.0,
            setpoint: 0.0,
        };
        c.set_desired_height(desired_height);
        c
    }

    /// Clamp `height` into the tube and recompute the setpoint distance.
    pub fn set_desired_height(&mut self, height: f32) {
        self.desired_height = self.geometry.clamp_height(height);
        self.setpoint = self.geometry.setpoint_for(self.desired_height);
    }

    /// Power for `distance`; pure with respect to controller state.
    pub fn evaluate(&self, distance: f32) -> f32 {
        let d = distance.clamp(0.0, self.geometry.distance_max());
        let error = d - self.setpoint;
        if error.abs() <= self.deadband {
            return self.base_offset.clamp(0.0, 100.0);
        }
        (self.base_offset + self.kp * error).clamp(0.0, 100.0)
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

    pub fn kp(&self) -> f32 {
        self.kp
    }
}
