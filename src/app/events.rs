//! Outbound arbiter events.
//!
//! The [`ControlArbiter`](super::service::ControlArbiter) emits these through
//! the [`EventSink`](super::ports::EventSink) port so that skipped ticks,
//! fallbacks and dropped commands stay observable.

use crate::error::Error;
use crate::fsm::ControlMode;

#[derive(Debug, Clone, PartialEq)]
pub enum ArbiterEvent {
    /// The arbiter has started (carries the initial mode).
    Started(ControlMode),

    ModeChanged { from: ControlMode, to: ControlMode },

    /// No fresh sample; nothing was evaluated or sent.
    TickSkipped(Error),

    /// A controller returned an error or a non-finite power.
    ControllerFault { mode: ControlMode, error: Error },

    /// The fuzzy controller answered with its fallback power.
    InferenceFallback { total: u32 },

    PowerDispatched { mode: ControlMode, power_pct: f32 },

    /// The link refused a command.  Not retried.
    CommandDropped { power_pct: f32, error: Error },

    /// An operator power arrived outside manual mode.
    ManualInputIgnored { power_pct: f32 },

    DesiredHeightChanged { height_cm: f32 },

    Recalibrated { groups: usize, trim_gain: Option<f32> },
}
