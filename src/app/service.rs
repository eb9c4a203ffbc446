//! Control arbiter: the hexagonal core.
//!
//! [`ControlArbiter`] owns the mode machine, both controllers and the
//! dispatch bookkeeping.  All I/O flows through port traits injected at
//! call sites, so the whole tick is testable with mock adapters.
//!
//! ```text
//!  SampleCache ──▶ ┌──────────────────────────────┐ ──▶ ActuationLink
//!                  │        ControlArbiter        │ ──▶ HistorySink
//!  Clock ────────▶ │  ModeMachine · Fuzzy · Prop  │ ──▶ EventSink
//!                  └──────────────────────────────┘
//! ```
//!
//! Nothing inside a tick can escape as a panic or an `Err`: stale input
//! skips the tick, a controller fault drops this tick's command, and a link
//! refusal drops the command without retry.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::calibration::history::HistoryRecord;
use crate::config::{SystemConfig, TubeGeometry};
use crate::control::{Controller, FuzzyController, ProportionalController};
use crate::error::Error;
use crate::fsm::context::ModeContext;
use crate::fsm::states::build_mode_table;
use crate::fsm::{ControlMode, ModeMachine};
use crate::sensors::{PowerMonitor, SampleCache};

use super::commands::OperatorCommand;
use super::events::ArbiterEvent;
use super::ports::{ActuationLink, Clock, EventSink, HistorySink};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// No usable sample; nothing evaluated or sent.
    Skipped(Error),
    /// Manual mode; the operator's power stands.
    Held,
    /// A new power was accepted by the link.
    Dispatched(f32),
    /// The new power was within hysteresis of the last one.
    Suppressed(f32),
    /// The controller failed; no command this tick.
    Fault(Error),
    /// The link refused the command.
    Dropped(Error),
}

// ───────────────────────────────────────────────────────────────
// ControlArbiter
// ───────────────────────────────────────────────────────────────

pub struct ControlArbiter {
    modes: ModeMachine,
    ctx: ModeContext,
    fuzzy: FuzzyController,
    proportional: ProportionalController,
    cache: Arc<SampleCache>,
    power: PowerMonitor,
    desired_height: f32,
    staleness_ms: u64,
    hysteresis: f32,
    log_interval_ms: u64,
    last_log_ms: Option<u64>,
    tick_count: u64,
    skipped_ticks: u64,
    stale_streak: u64,
    fallbacks_seen: u32,
}

impl ControlArbiter {
    /// Construct the arbiter with a fresh sample cache.
    ///
    /// Does **not** start the mode machine; call [`start`](Self::start).
    pub fn new(config: &SystemConfig) -> Self {
        Self::with_cache(config, Arc::new(SampleCache::new()))
    }

    pub fn with_cache(config: &SystemConfig, cache: Arc<SampleCache>) -> Self {
        let a = &config.arbiter;
        let fuzzy = FuzzyController::new(&config.fuzzy, a.initial_height_cm);
        let proportional = ProportionalController::new(&config.proportional, a.initial_height_cm);
        Self {
            modes: ModeMachine::new(build_mode_table(), a.initial_mode),
            ctx: ModeContext::default(),
            desired_height: fuzzy.desired_height(),
            fuzzy,
            proportional,
            cache,
            power: PowerMonitor::new(),
            staleness_ms: u64::from(a.staleness_ms),
            hysteresis: a.hysteresis_pct.max(0.0),
            log_interval_ms: u64::from(a.log_interval_ms),
            last_log_ms: None,
            tick_count: 0,
            skipped_ticks: 0,
            stale_streak: 0,
            fallbacks_seen: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.modes.start(&mut self.ctx);
        let mode = self.mode();
        sink.emit(&ArbiterEvent::Started(mode));
        info!(
            "Arbiter started in {} (height {:.1} cm)",
            mode, self.desired_height
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: freshness check → controller → dispatch →
    /// history.
    pub fn tick(
        &mut self,
        clock: &impl Clock,
        link: &mut impl ActuationLink,
        history: &mut impl HistorySink,
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        self.tick_count += 1;
        let now = clock.now_ms();

        // 1. Freshness
        let sample = match self.cache.fresh(now, self.staleness_ms) {
            Ok(s) => {
                if self.stale_streak > 0 {
                    info!("Arbiter: input fresh again after {} skipped ticks", self.stale_streak);
                    self.stale_streak = 0;
                }
                s
            }
            Err(e) => {
                self.skipped_ticks += 1;
                if self.stale_streak == 0 {
                    warn!("Arbiter: {e}, skipping ticks until a sample arrives");
                }
                self.stale_streak += 1;
                sink.emit(&ArbiterEvent::TickSkipped(e));
                return TickOutcome::Skipped(e);
            }
        };

        // 2./3. Evaluate the active law
        let mode = self.mode();
        let outcome = match self.evaluate(mode, sample.distance_cm, sink) {
            None => TickOutcome::Held,
            Some(Ok(power)) => self.dispatch(mode, power, link, sink),
            Some(Err(e)) => {
                warn!("Arbiter: {} controller fault: {e}", mode);
                sink.emit(&ArbiterEvent::ControllerFault { mode, error: e });
                TickOutcome::Fault(e)
            }
        };

        // 4. Rate-limited history
        self.maybe_record(now, sample.distance_cm, clock, history);

        outcome
    }

    /// `None` in manual mode, otherwise the active law's answer.
    fn evaluate(
        &mut self,
        mode: ControlMode,
        distance: f32,
        sink: &mut impl EventSink,
    ) -> Option<Result<f32, Error>> {
        let law: &mut dyn Controller = match mode {
            ControlMode::Manual => return None,
            ControlMode::Proportional => &mut self.proportional,
            ControlMode::Fuzzy => &mut self.fuzzy,
        };
        let result = law.compute(distance).and_then(|p| {
            if p.is_finite() {
                Ok(p)
            } else {
                Err(Error::InferenceFailure)
            }
        });

        let total = self.fuzzy.fallback_count();
        if total != self.fallbacks_seen {
            self.fallbacks_seen = total;
            sink.emit(&ArbiterEvent::InferenceFallback { total });
        }
        Some(result)
    }

    fn dispatch(
        &mut self,
        mode: ControlMode,
        power: f32,
        link: &mut impl ActuationLink,
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        let power = power.clamp(0.0, 100.0);
        if let Some(prev) = self.ctx.last_dispatched {
            if (power - prev).abs() <= self.hysteresis {
                debug!("Arbiter: {power:.3}% within hysteresis of {prev:.3}%");
                return TickOutcome::Suppressed(power);
            }
        }
        match self.send(mode, power, link, sink) {
            Ok(()) => TickOutcome::Dispatched(power),
            Err(e) => TickOutcome::Dropped(e),
        }
    }

    fn send(
        &mut self,
        mode: ControlMode,
        power: f32,
        link: &mut impl ActuationLink,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        match link.send_power(power) {
            Ok(()) => {
                self.ctx.last_dispatched = Some(power);
                self.power.store(power);
                sink.emit(&ArbiterEvent::PowerDispatched {
                    mode,
                    power_pct: power,
                });
                Ok(())
            }
            Err(e) => {
                warn!("Arbiter: dropped {power:.1}%: {e}");
                sink.emit(&ArbiterEvent::CommandDropped {
                    power_pct: power,
                    error: e,
                });
                Err(e)
            }
        }
    }

    fn maybe_record(
        &mut self,
        now: u64,
        distance: f32,
        clock: &impl Clock,
        history: &mut impl HistorySink,
    ) {
        if let Some(last) = self.last_log_ms {
            if now.saturating_sub(last) < self.log_interval_ms {
                return;
            }
        }
        self.last_log_ms = Some(now);
        let mode = self.mode();
        let geometry = self.geometry_for(mode);
        history.record(&HistoryRecord {
            timestamp: clock.wall_time_iso(),
            distance_cm: distance,
            measured_height_cm: geometry.height_for_distance(distance),
            desired_height_cm: self.desired_height,
            power_pct: self.ctx.last_dispatched.unwrap_or(0.0),
            mode,
        });
    }

    fn geometry_for(&self, mode: ControlMode) -> TubeGeometry {
        match mode {
            ControlMode::Proportional => *self.proportional.geometry(),
            ControlMode::Manual | ControlMode::Fuzzy => *self.fuzzy.geometry(),
        }
    }

    // ── Operator commands ─────────────────────────────────────

    pub fn handle_command(
        &mut self,
        cmd: OperatorCommand,
        link: &mut impl ActuationLink,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            OperatorCommand::SetDesiredHeight(h) => {
                if !h.is_finite() {
                    warn!("Arbiter: ignoring non-finite desired height");
                    return;
                }
                self.fuzzy.set_desired_height(h);
                self.proportional.set_desired_height(h);
                self.desired_height = self.fuzzy.desired_height();
                info!(
                    "Arbiter: desired height {:.1} cm (setpoints fuzzy {:.2}, proportional {:.2})",
                    self.desired_height,
                    self.fuzzy.setpoint(),
                    self.proportional.setpoint()
                );
                sink.emit(&ArbiterEvent::DesiredHeightChanged {
                    height_cm: self.desired_height,
                });
            }
            OperatorCommand::CycleMode => {
                let (from, to) = self.modes.cycle(&mut self.ctx);
                if let Some(seed) = self.ctx.take_seed() {
                    self.fuzzy.prime(seed);
                }
                sink.emit(&ArbiterEvent::ModeChanged { from, to });
            }
            OperatorCommand::SetManualPower(p) => {
                if !self.ctx.manual_armed || !p.is_finite() {
                    info!("Arbiter: manual power {p:.1}% ignored in {}", self.mode());
                    sink.emit(&ArbiterEvent::ManualInputIgnored { power_pct: p });
                    return;
                }
                let p = p.clamp(0.0, 100.0);
                self.ctx.manual_power = Some(p);
                // Errors are already reported as CommandDropped.
                let _ = self.send(ControlMode::Manual, p, link, sink);
            }
            OperatorCommand::Recalibrate(result) => {
                self.fuzzy.apply_calibration(&result);
                info!(
                    "Arbiter: recalibrated from {} groups",
                    result.report.groups_used
                );
                sink.emit(&ArbiterEvent::Recalibrated {
                    groups: result.report.groups_used,
                    trim_gain: result.trim_gain,
                });
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn mode(&self) -> ControlMode {
        self.modes.current_mode()
    }

    /// Last power the link accepted; survives loop shutdown.
    pub fn last_dispatched(&self) -> Option<f32> {
        self.ctx.last_dispatched
    }

    pub fn manual_power(&self) -> Option<f32> {
        self.ctx.manual_power
    }

    pub fn desired_height(&self) -> f32 {
        self.desired_height
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks
    }

    pub fn power_monitor(&self) -> PowerMonitor {
        self.power.clone()
    }

    pub fn cache(&self) -> Arc<SampleCache> {
        Arc::clone(&self.cache)
    }

    pub fn fuzzy(&self) -> &FuzzyController {
        &self.fuzzy
    }

    pub fn proportional(&self) -> &ProportionalController {
        &self.proportional
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::DistanceSample;

    struct NullLink;
    impl ActuationLink for NullLink {
        fn send_power(&mut self, _: f32) -> Result<(), Error> {
            Ok(())
        }
    }

    struct FixedClock(u64);
    impl Clock for FixedClock {
        fn now_ms(&self) -> u64 {
            self.0
        }
        fn wall_time_iso(&self) -> heapless::String<32> {
            heapless::String::new()
        }
    }

    struct NullHistory;
    impl HistorySink for NullHistory {
        fn record(&mut self, _: &HistoryRecord) {}
    }

    struct NullSink;
    impl EventSink for NullSink {
        fn emit(&mut self, _: &ArbiterEvent) {}
    }

    #[test]
    fn manual_mode_never_evaluates() {
        let mut arb = ControlArbiter::new(&SystemConfig::default());
        arb.start(&mut NullSink);
        arb.cache().publish(DistanceSample::new(30.0, 0).unwrap());
        let out = arb.tick(&FixedClock(10), &mut NullLink, &mut NullHistory, &mut NullSink);
        assert_eq!(out, TickOutcome::Held);
        assert_eq!(arb.last_dispatched(), None);
    }

    #[test]
    fn height_command_reaches_both_controllers() {
        let mut arb = ControlArbiter::new(&SystemConfig::default());
        arb.start(&mut NullSink);
        arb.handle_command(OperatorCommand::SetDesiredHeight(10.0), &mut NullLink, &mut NullSink);
        assert_eq!(arb.desired_height(), 10.0);
        assert_eq!(arb.fuzzy().desired_height(), 10.0);
        assert_eq!(arb.proportional().desired_height(), 10.0);
    }

    #[test]
    fn nan_height_is_ignored() {
        let mut arb = ControlArbiter::new(&SystemConfig::default());
        arb.handle_command(OperatorCommand::SetDesiredHeight(f32::NAN), &mut NullLink, &mut NullSink);
        assert_eq!(arb.desired_height(), 20.0);
    }

    #[test]
    fn power_monitor_tracks_dispatch() {
        let mut arb = ControlArbiter::new(&SystemConfig::default());
        arb.start(&mut NullSink);
        let monitor = arb.power_monitor();
        arb.handle_command(OperatorCommand::SetManualPower(140.0), &mut NullLink, &mut NullSink);
        assert_eq!(monitor.load(), Some(100.0));
        assert_eq!(arb.manual_power(), Some(100.0));
    }
}
