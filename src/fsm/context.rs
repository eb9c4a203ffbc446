//! Shared context threaded through every mode handler.
//!
//! The arbiter writes `last_dispatched` after each successful actuation;
//! handlers read it to decide what the next mode starts from.

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModeContext {
    /// Power the operator is holding in manual mode.
    pub manual_power: Option<f32>,
    /// Operator power commands are only honoured while this is set.
    pub manual_armed: bool,
    /// Last power the actuation link accepted.
    pub last_dispatched: Option<f32>,
    /// Smoothing memory the fuzzy controller should start from, consumed by
    /// the arbiter on entry.
    pub smoothing_seed: Option<f32>,
}

impl ModeContext {
    /// Take the pending smoothing seed, leaving `None`.
    pub fn take_seed(&mut self) -> Option<f32> {
        self.smoothing_seed.take()
    }
}
