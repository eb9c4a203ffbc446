//! Integration tests for the history → calibration → controller loop.
//!
//! A run of the arbiter produces history records; those are serialised,
//! parsed back, calibrated and installed into the fuzzy controller.

use crate::mock_hw::{LogSink, MockClock, MockLink, RecordingHistory};

use levitator::app::commands::OperatorCommand;
use levitator::app::service::ControlArbiter;
use levitator::calibration::history::{HEADER, parse_history};
use levitator::calibration::raw::{CSV_HEADER, parse_raw_log, to_csv};
use levitator::calibration::Calibrator;
use levitator::config::{SpikeFilterConfig, SystemConfig};
use levitator::error::{CalibrationDataError, Error};
use levitator::fsm::ControlMode;
use levitator::sensors::DistanceSample;

/// Run the fuzzy loop over a wobbling object at two desired heights and
/// return the history log as text.
fn recorded_session(config: &SystemConfig) -> String {
    let mut arbiter = ControlArbiter::new(config);
    let mut link = MockLink::new();
    let clock = MockClock::at(0);
    let mut history = RecordingHistory::default();
    let mut sink = LogSink::new();
    arbiter.start(&mut sink);

    for (height, base) in [(20.0_f32, 80.0_f32), (40.0, 60.0)] {
        arbiter.handle_command(OperatorCommand::SetDesiredHeight(height), &mut link, &mut sink);
        for i in 0..40 {
            let wobble = ((i % 7) as f32 - 3.0) * 0.8;
            let sample = DistanceSample::new(base + wobble, clock.now.get()).unwrap();
            arbiter.cache().publish(sample);
            clock.advance(100);
            arbiter.tick(&clock, &mut link, &mut history, &mut sink);
        }
    }

    let mut text = String::from(HEADER);
    text.push('\n');
    for r in &history.records {
        text.push_str(&r.to_line());
        text.push('\n');
    }
    text
}

fn fuzzy_start() -> SystemConfig {
    let mut cfg = SystemConfig::default();
    cfg.arbiter.initial_mode = ControlMode::Fuzzy;
    cfg
}

#[test]
fn session_log_calibrates_and_installs() {
    let cfg = fuzzy_start();
    let text = recorded_session(&cfg);
    let parsed = parse_history(&text);
    assert_eq!(parsed.skipped, 0);
    assert_eq!(parsed.records.len(), 80);

    let result = Calibrator::new(&cfg).calibrate(&parsed.records).unwrap();
    assert_eq!(result.report.groups_used, 2);
    assert_eq!(result.report.groups_dropped, 0);

    let inputs = result.input_peaks.unwrap();
    assert!(inputs.windows(2).all(|w| w[1] > w[0]));
    let outputs = result.output_peaks.unwrap();
    assert!(outputs.iter().all(|&p| p >= cfg.fuzzy.minimum_power_pct && p <= 100.0));
    let gain = result.trim_gain.unwrap();
    assert!(gain >= cfg.calibration.base_gain && gain <= cfg.calibration.max_gain);
    let table = result.lookup.as_ref().unwrap();
    assert_eq!(table.len(), 2);
    assert!(table.points().iter().all(|p| {
        p.power_pct >= cfg.calibration.power_floor_pct
            && p.power_pct <= cfg.calibration.power_ceiling_pct
    }));

    // Install it and keep controlling.
    let mut arbiter = ControlArbiter::new(&cfg);
    let mut link = MockLink::new();
    let clock = MockClock::at(0);
    let mut history = RecordingHistory::default();
    let mut sink = LogSink::new();
    arbiter.start(&mut sink);
    arbiter.handle_command(OperatorCommand::Recalibrate(Box::new(result)), &mut link, &mut sink);
    assert_eq!(arbiter.fuzzy().trim_gain(), gain);

    for d in [10.0, 40.0, 70.0, 95.0] {
        arbiter.cache().publish(DistanceSample::new(d, clock.now.get()).unwrap());
        clock.advance(50);
        arbiter.tick(&clock, &mut link, &mut history, &mut sink);
    }
    assert!(link.accepted.iter().all(|&p| (cfg.fuzzy.minimum_power_pct..=100.0).contains(&p)));
}

#[test]
fn sparse_log_is_rejected_and_controller_untouched() {
    let cfg = fuzzy_start();
    let text = recorded_session(&cfg);
    let parsed = parse_history(&text);
    let err = Calibrator::new(&cfg).calibrate(&parsed.records[..3]);
    assert_eq!(
        err,
        Err(Error::CalibrationData(CalibrationDataError::InsufficientRecords))
    );
}

#[test]
fn malformed_lines_are_skipped() {
    let cfg = fuzzy_start();
    let mut text = recorded_session(&cfg);
    text.push_str("not,a,record\n");
    text.push_str("2025-01-01T00:00:00.000,abc,1,2,3,fuzzy\n");
    text.push_str("2025-01-01T00:00:00.000,30,20,20,50,hover\n");
    let parsed = parse_history(&text);
    assert_eq!(parsed.records.len(), 80);
    assert_eq!(parsed.skipped, 3);
}

#[test]
fn raw_sweep_log_converts_to_csv() {
    let log = "\
Iniciando varredura
PWM: 100, Medida 1: Distância: 30.00 cm
PWM ajustado para 110
PWM: 110, Medida 2: Distância: 31.00 cm
PWM: 120, Medida 3: Distância: 62.00 cm
PWM: 250, Medida 4: Distância: 31.50 cm
PWM: 130, Medida 5: Distância: 32.00 cm
";
    let filter = SpikeFilterConfig {
        delta_max_cm: 10.0,
        ..SpikeFilterConfig::default()
    };
    let (samples, report) = parse_raw_log(log, &filter);
    assert_eq!(report.parsed, 5);
    assert_eq!(report.saturated, 1);
    assert_eq!(report.spikes, 1);
    let distances: Vec<f32> = samples.iter().map(|s| s.distance_cm).collect();
    assert_eq!(distances, vec![30.0, 31.0, 32.0]);
    assert_eq!(
        to_csv(&samples),
        format!("{CSV_HEADER}\n100,30.00\n110,31.00\n130,32.00\n")
    );
}
