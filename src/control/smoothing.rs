//! Exponential smoothing of controller output.
//!
//! `y = alpha * x + (1 - alpha) * previous`.  The first value after a reset
//! passes through unchanged.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpSmoother {
    alpha: f32,
    previous: Option<f32>,
}

impl ExpSmoother {
    /// `alpha` is clamped into `(0, 1]`; a non-finite or non-positive
    /// value disables smoothing.
    pub fn new(alpha: f32) -> Self {
        let alpha = if alpha.is_finite() && alpha > 0.0 {
            alpha.min(1.0)
        } else {
            1.0
        };
        Self {
            alpha,
            previous: None,
        }
    }

    /// Smooth `x` against the stored memory and store the result.
    pub fn apply(&mut self, x: f32) -> f32 {
        let y = match self.previous {
            Some(prev) => self.alpha * x + (1.0 - self.alpha) * prev,
            None => x,
        };
        self.previous = Some(y);
        y
    }

    /// Overwrite the memory without producing an output.
    pub fn prime(&mut self, value: f32) {
        if value.is_finite() {
            self.previous = Some(value);
        }
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn previous(&self) -> Option<f32> {
        self.previous
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}
