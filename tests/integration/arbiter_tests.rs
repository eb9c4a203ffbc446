//! Integration tests for the SampleCache → ControlArbiter → link pipeline.
//!
//! Every test drives the real arbiter with mock adapters and asserts on the
//! exact sequence of powers the link saw.

use crate::mock_hw::{LogSink, MockClock, MockLink, RecordingHistory};

use levitator::app::commands::OperatorCommand;
use levitator::app::events::ArbiterEvent;
use levitator::app::service::{ControlArbiter, TickOutcome};
use levitator::calibration::CalibrationResult;
use levitator::config::{StrategyKind, SystemConfig, TubeGeometry};
use levitator::control::lookup::{LookupPoint, LookupTable};
use levitator::error::Error;
use levitator::fsm::ControlMode;
use levitator::sensors::DistanceSample;

struct Rig {
    arbiter: ControlArbiter,
    link: MockLink,
    clock: MockClock,
    history: RecordingHistory,
    sink: LogSink,
}

impl Rig {
    fn new(config: &SystemConfig) -> Self {
        let mut rig = Self {
            arbiter: ControlArbiter::new(config),
            link: MockLink::new(),
            clock: MockClock::at(1_000),
            history: RecordingHistory::default(),
            sink: LogSink::new(),
        };
        rig.arbiter.start(&mut rig.sink);
        rig
    }

    /// Publish `distance` stamped now, advance one period, tick.
    fn step(&mut self, distance: f32) -> TickOutcome {
        let sample = DistanceSample::new(distance, self.clock.now.get()).unwrap();
        self.arbiter.cache().publish(sample);
        self.clock.advance(50);
        self.tick()
    }

    fn tick(&mut self) -> TickOutcome {
        self.arbiter
            .tick(&self.clock, &mut self.link, &mut self.history, &mut self.sink)
    }

    fn command(&mut self, cmd: OperatorCommand) {
        self.arbiter.handle_command(cmd, &mut self.link, &mut self.sink);
    }
}

/// Tube where a 25 cm height maps to a 25 cm setpoint, starting in fuzzy.
fn fuzzy_scenario() -> SystemConfig {
    let mut cfg = SystemConfig::default();
    cfg.fuzzy.geometry = TubeGeometry {
        tube_height_cm: 51.0,
        sensor_height_cm: 2.0,
        object_radius_cm: 3.0,
    };
    cfg.arbiter.initial_mode = ControlMode::Fuzzy;
    cfg.arbiter.initial_height_cm = 25.0;
    cfg
}

// ── Fuzzy mode ────────────────────────────────────────────────

#[test]
fn object_at_setpoint_settles_mid_band() {
    let mut rig = Rig::new(&fuzzy_scenario());
    for _ in 0..3 {
        rig.step(25.0);
    }
    let p = rig.arbiter.last_dispatched().unwrap();
    assert!((45.0..=60.0).contains(&p), "got {p}");
    // Steady input: the first dispatch stands, the rest are suppressed.
    assert_eq!(rig.link.accepted.len(), 1);
}

#[test]
fn object_far_below_target_gets_more_power() {
    let mut at_target = Rig::new(&fuzzy_scenario());
    at_target.step(25.0);
    let mut low = Rig::new(&fuzzy_scenario());
    low.step(45.0);
    let a = at_target.link.last_accepted().unwrap();
    let b = low.link.last_accepted().unwrap();
    assert!(b > 75.0, "got {b}");
    assert!(b > a);
}

#[test]
fn fuzzy_output_never_below_minimum() {
    let mut rig = Rig::new(&fuzzy_scenario());
    for d in [1.0, 2.0, 5.0, 10.0, 3.0] {
        rig.step(d);
    }
    let floor = SystemConfig::default().fuzzy.minimum_power_pct;
    assert!(rig.link.accepted.iter().all(|&p| p >= floor && p <= 100.0));
}

// ── Freshness ─────────────────────────────────────────────────

#[test]
fn stale_sample_skips_tick_and_keeps_power() {
    let mut rig = Rig::new(&fuzzy_scenario());
    rig.step(30.0);
    let before = rig.arbiter.last_dispatched();
    let calls = rig.link.calls.len();

    rig.clock.advance(900);
    assert_eq!(rig.tick(), TickOutcome::Skipped(Error::StaleInput));
    assert_eq!(rig.arbiter.last_dispatched(), before);
    assert_eq!(rig.link.calls.len(), calls);
    assert_eq!(rig.arbiter.skipped_ticks(), 1);
    assert_eq!(
        rig.sink.events.last(),
        Some(&ArbiterEvent::TickSkipped(Error::StaleInput))
    );
}

#[test]
fn no_sample_yet_skips_without_history() {
    let mut rig = Rig::new(&fuzzy_scenario());
    assert!(matches!(rig.tick(), TickOutcome::Skipped(_)));
    assert!(rig.history.records.is_empty());
    assert!(rig.link.calls.is_empty());
}

// ── Mode cycling and manual override ──────────────────────────

#[test]
fn mode_cycle_fuzzy_manual_proportional_fuzzy() {
    let mut rig = Rig::new(&fuzzy_scenario());
    assert_eq!(rig.arbiter.mode(), ControlMode::Fuzzy);
    rig.step(30.0);
    let fuzzy_power = rig.arbiter.last_dispatched();

    rig.command(OperatorCommand::CycleMode);
    assert_eq!(rig.arbiter.mode(), ControlMode::Manual);
    // Manual takes over the power in effect.
    assert_eq!(rig.arbiter.manual_power(), fuzzy_power);

    rig.command(OperatorCommand::CycleMode);
    assert_eq!(rig.arbiter.mode(), ControlMode::Proportional);
    assert_eq!(rig.arbiter.manual_power(), None);

    rig.command(OperatorCommand::CycleMode);
    assert_eq!(rig.arbiter.mode(), ControlMode::Fuzzy);

    let changes: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            ArbiterEvent::ModeChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        changes,
        vec![
            (ControlMode::Fuzzy, ControlMode::Manual),
            (ControlMode::Manual, ControlMode::Proportional),
            (ControlMode::Proportional, ControlMode::Fuzzy),
        ]
    );
}

#[test]
fn manual_mode_holds_operator_power() {
    let mut rig = Rig::new(&SystemConfig::default());
    assert_eq!(rig.arbiter.mode(), ControlMode::Manual);
    rig.command(OperatorCommand::SetManualPower(40.0));
    assert_eq!(rig.link.accepted, vec![40.0]);

    // Ticks evaluate nothing and send nothing.
    for _ in 0..5 {
        assert_eq!(rig.step(80.0), TickOutcome::Held);
    }
    assert_eq!(rig.link.accepted, vec![40.0]);
    assert_eq!(rig.arbiter.last_dispatched(), Some(40.0));
}

#[test]
fn manual_power_is_ignored_outside_manual() {
    let mut rig = Rig::new(&fuzzy_scenario());
    rig.command(OperatorCommand::SetManualPower(90.0));
    assert!(rig.link.calls.is_empty());
    assert_eq!(
        rig.sink.count(|e| matches!(e, ArbiterEvent::ManualInputIgnored { .. })),
        1
    );
}

#[test]
fn proportional_mode_follows_distance_error() {
    let mut rig = Rig::new(&SystemConfig::default());
    rig.command(OperatorCommand::CycleMode);
    assert_eq!(rig.arbiter.mode(), ControlMode::Proportional);
    // Default tube: height 20 cm sits at a 30 cm setpoint.
    assert_eq!(rig.arbiter.proportional().setpoint(), 30.0);

    assert_eq!(rig.step(30.5), TickOutcome::Dispatched(57.0));
    assert_eq!(rig.step(40.0), TickOutcome::Dispatched(77.0));
    assert_eq!(rig.step(100.0), TickOutcome::Dispatched(100.0));
}

// ── Dispatch ──────────────────────────────────────────────────

#[test]
fn hysteresis_suppresses_tiny_changes() {
    let mut rig = Rig::new(&SystemConfig::default());
    rig.command(OperatorCommand::CycleMode);
    rig.step(40.0);
    // 40.02 cm is 0.04% more power, inside the 0.1% hysteresis.
    assert!(matches!(rig.step(40.02), TickOutcome::Suppressed(_)));
    assert_eq!(rig.link.accepted, vec![77.0]);
}

#[test]
fn link_refusal_drops_command_without_retry() {
    let mut rig = Rig::new(&SystemConfig::default());
    rig.command(OperatorCommand::CycleMode);
    rig.link.failing = true;
    assert_eq!(
        rig.step(40.0),
        TickOutcome::Dropped(Error::ActuationLinkUnavailable)
    );
    assert_eq!(rig.link.calls.len(), 1);
    assert_eq!(rig.arbiter.last_dispatched(), None);
    assert_eq!(
        rig.sink.count(|e| matches!(e, ArbiterEvent::CommandDropped { .. })),
        1
    );

    rig.link.failing = false;
    assert_eq!(rig.step(40.0), TickOutcome::Dispatched(77.0));
    assert_eq!(rig.link.calls.len(), 2);
}

// ── Desired height, history, recalibration ────────────────────

#[test]
fn desired_height_is_clamped_to_tube() {
    let mut rig = Rig::new(&fuzzy_scenario());
    rig.command(OperatorCommand::SetDesiredHeight(500.0));
    let g = rig.arbiter.fuzzy().geometry().max_height();
    assert_eq!(rig.arbiter.desired_height(), g);
    rig.command(OperatorCommand::SetDesiredHeight(-4.0));
    assert_eq!(rig.arbiter.desired_height(), 0.0);
}

#[test]
fn history_is_rate_limited() {
    let mut rig = Rig::new(&fuzzy_scenario());
    for _ in 0..10 {
        rig.step(30.0);
    }
    // 50 ms ticks, 100 ms log interval.
    assert_eq!(rig.history.records.len(), 5);
    let r = &rig.history.records[0];
    assert_eq!(r.mode, ControlMode::Fuzzy);
    assert_eq!(r.desired_height_cm, 25.0);
    assert_eq!(r.distance_cm, 30.0);
    assert!((r.measured_height_cm - 20.0).abs() < 1e-4);
}

#[test]
fn recalibration_reaches_fuzzy_controller() {
    let mut rig = Rig::new(&fuzzy_scenario());
    let result = CalibrationResult {
        trim_gain: Some(1.25),
        ..CalibrationResult::default()
    };
    rig.command(OperatorCommand::Recalibrate(Box::new(result)));
    assert_eq!(rig.arbiter.fuzzy().trim_gain(), 1.25);
    assert!(matches!(
        rig.sink.events.last(),
        Some(ArbiterEvent::Recalibrated { trim_gain: Some(_), .. })
    ));
}

// ── Lookup correction ─────────────────────────────────────────

fn lookup_scenario() -> SystemConfig {
    let mut cfg = fuzzy_scenario();
    cfg.fuzzy.strategy = StrategyKind::LookupCorrection;
    cfg
}

fn flat_table(setpoint_cm: f32, power_pct: f32) -> LookupTable {
    LookupTable::from_points(&[LookupPoint {
        setpoint_cm,
        power_pct,
    }])
    .unwrap()
}

fn fallback_events(sink: &LogSink) -> Vec<u32> {
    sink.events
        .iter()
        .filter_map(|e| match e {
            ArbiterEvent::InferenceFallback { total } => Some(*total),
            _ => None,
        })
        .collect()
}

#[test]
fn empty_lookup_table_dispatches_fallback_and_reports_it() {
    let mut rig = Rig::new(&lookup_scenario());
    let outcomes: Vec<_> = [5.0, 25.0, 50.0].into_iter().map(|d| rig.step(d)).collect();
    assert_eq!(
        outcomes,
        [
            TickOutcome::Dispatched(55.0),
            TickOutcome::Suppressed(55.0),
            TickOutcome::Suppressed(55.0),
        ]
    );
    assert_eq!(rig.link.accepted, [55.0]);
    assert_eq!(fallback_events(&rig.sink), [1, 2, 3]);
}

#[test]
fn recalibration_ends_lookup_fallback() {
    let mut rig = Rig::new(&lookup_scenario());
    rig.step(25.0);
    assert_eq!(fallback_events(&rig.sink), [1]);

    rig.command(OperatorCommand::Recalibrate(Box::new(CalibrationResult {
        lookup: Some(flat_table(25.0, 40.0)),
        ..CalibrationResult::default()
    })));
    assert_eq!(rig.step(25.0), TickOutcome::Dispatched(40.0));
    assert_eq!(fallback_events(&rig.sink), [1]);
}

#[test]
fn saved_calibration_drives_lookup_from_startup() {
    let mut cfg = lookup_scenario();
    cfg.fuzzy.calibrated = Some(CalibrationResult {
        lookup: Some(flat_table(25.0, 50.0)),
        trim_gain: Some(1.0),
        ..CalibrationResult::default()
    });
    let mut rig = Rig::new(&cfg);
    let first = rig.step(20.0);
    let second = rig.step(30.0);
    // 50 + 1.0 * (20 - 25), then 0.3 * 55 + 0.7 * 45.
    let TickOutcome::Dispatched(a) = first else {
        panic!("{first:?}");
    };
    let TickOutcome::Dispatched(b) = second else {
        panic!("{second:?}");
    };
    assert!((a - 45.0).abs() < 1e-3, "got {a}");
    assert!((b - 48.0).abs() < 1e-3, "got {b}");
    assert!(fallback_events(&rig.sink).is_empty());
}
