//! Integration tests for the threaded control loop.
//!
//! Uses the real `HostClock` and a short period; assertions only depend on
//! the loop having ticked at least a few times.

use std::thread::sleep;
use std::time::Duration;

use crate::mock_hw::{LogSink, RecordingHistory, SharedLink};

use levitator::adapters::time::HostClock;
use levitator::app::commands::OperatorCommand;
use levitator::app::events::ArbiterEvent;
use levitator::app::ports::Clock;
use levitator::app::service::ControlArbiter;
use levitator::config::SystemConfig;
use levitator::fsm::ControlMode;
use levitator::runtime::{self, LoopIo};

fn fuzzy_config() -> SystemConfig {
    let mut cfg = SystemConfig::default();
    cfg.arbiter.initial_mode = ControlMode::Fuzzy;
    cfg
}

fn io(link: SharedLink, clock: HostClock) -> LoopIo<SharedLink, RecordingHistory, LogSink, HostClock> {
    LoopIo {
        link,
        history: RecordingHistory::default(),
        events: LogSink::new(),
        clock,
    }
}

#[test]
fn loop_ingests_samples_and_dispatches() {
    let clock = HostClock::new();
    let link = SharedLink::default();
    let handle = runtime::spawn(
        ControlArbiter::new(&fuzzy_config()),
        io(link.clone(), clock),
        Duration::from_millis(10),
    )
    .unwrap();
    let feed = handle.feed();
    let monitor = handle.power_monitor();

    for i in 0..60 {
        let d = if i < 30 { 90.0 } else { 40.0 };
        feed.push(d, clock.now_ms()).unwrap();
        sleep(Duration::from_millis(5));
    }
    assert!(handle.is_running());

    let (arbiter, io) = handle.stop().unwrap();
    assert!(arbiter.tick_count() > 5);
    let sent = link.snapshot();
    assert!(!sent.is_empty());
    assert_eq!(arbiter.last_dispatched(), sent.last().copied());
    // The monitor outlives the loop and still reports the last power.
    assert_eq!(monitor.load(), arbiter.last_dispatched());
    assert!(!io.history.records.is_empty());
    assert_eq!(io.events.events.first(), Some(&ArbiterEvent::Started(ControlMode::Fuzzy)));
}

#[test]
fn commands_are_applied_between_ticks() {
    let clock = HostClock::new();
    let handle = runtime::spawn(
        ControlArbiter::new(&fuzzy_config()),
        io(SharedLink::default(), clock),
        Duration::from_millis(10),
    )
    .unwrap();

    assert!(handle.commands().submit(OperatorCommand::SetDesiredHeight(35.0)));
    assert!(handle.commands().submit(OperatorCommand::CycleMode));
    sleep(Duration::from_millis(100));

    let (arbiter, io) = handle.stop().unwrap();
    assert_eq!(arbiter.mode(), ControlMode::Manual);
    assert_eq!(arbiter.desired_height(), 35.0);
    assert!(io.events.events.iter().any(|e| matches!(
        e,
        ArbiterEvent::ModeChanged {
            from: ControlMode::Fuzzy,
            to: ControlMode::Manual
        }
    )));
}

#[test]
fn silent_link_only_skips() {
    let clock = HostClock::new();
    let link = SharedLink::default();
    let handle = runtime::spawn(
        ControlArbiter::new(&fuzzy_config()),
        io(link.clone(), clock),
        Duration::from_millis(10),
    )
    .unwrap();
    sleep(Duration::from_millis(60));
    let (arbiter, _) = handle.stop().unwrap();
    assert!(link.snapshot().is_empty());
    assert_eq!(arbiter.skipped_ticks(), arbiter.tick_count());
    assert_eq!(arbiter.last_dispatched(), None);
}
