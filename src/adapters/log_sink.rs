//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing arbiter events through the `log`
//! facade as `TAG | key=value` lines.  Power dispatches are frequent, so
//! they go out at `debug`; everything an operator should notice is `info`
//! or `warn`.

use log::{debug, info, warn};

use crate::app::events::ArbiterEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`ArbiterEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink {
    skipped_since_fresh: u64,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &ArbiterEvent) {
        if !matches!(event, ArbiterEvent::TickSkipped(_)) && self.skipped_since_fresh > 0 {
            info!("STALE | cleared after {} ticks", self.skipped_since_fresh);
            self.skipped_since_fresh = 0;
        }
        match event {
            ArbiterEvent::Started(mode) => {
                info!("START | mode={}", mode);
            }
            ArbiterEvent::ModeChanged { from, to } => {
                info!("MODE | {} -> {}", from, to);
            }
            ArbiterEvent::TickSkipped(e) => {
                if self.skipped_since_fresh == 0 {
                    warn!("STALE | {}", e);
                }
                self.skipped_since_fresh += 1;
            }
            ArbiterEvent::ControllerFault { mode, error } => {
                warn!("FAULT | mode={} error={}", mode, error);
            }
            ArbiterEvent::InferenceFallback { total } => {
                warn!("FALLBACK | total={}", total);
            }
            ArbiterEvent::PowerDispatched { mode, power_pct } => {
                debug!("POWER | mode={} power={:.2}%", mode, power_pct);
            }
            ArbiterEvent::CommandDropped { power_pct, error } => {
                warn!("DROP | power={:.2}% error={}", power_pct, error);
            }
            ArbiterEvent::ManualInputIgnored { power_pct } => {
                info!("MANUAL | ignored power={:.1}%", power_pct);
            }
            ArbiterEvent::DesiredHeightChanged { height_cm } => {
                info!("HEIGHT | desired={:.1}cm", height_cm);
            }
            ArbiterEvent::Recalibrated { groups, trim_gain } => match trim_gain {
                Some(g) => info!("CALIB | groups={} trim_gain={:.3}", groups, g),
                None => info!("CALIB | groups={}", groups),
            },
        }
    }
}
