//! Inbound operator commands.
//!
//! These come from whatever front end the operator uses (console, UI,
//! test harness) and are applied by
//! [`ControlArbiter::handle_command`](super::service::ControlArbiter::handle_command)
//! between ticks.

use crate::calibration::CalibrationResult;

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    /// New target height (cm), clamped to the tube by each controller.
    SetDesiredHeight(f32),

    /// Advance `Manual → Proportional → Fuzzy → Manual`.
    CycleMode,

    /// Direct fan power (0–100%).  Only honoured in manual mode.
    SetManualPower(f32),

    /// Install a fresh calibration into the fuzzy controller.
    Recalibrate(Box<CalibrationResult>),
}
