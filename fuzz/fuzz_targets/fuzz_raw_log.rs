//! Fuzz target: raw sweep-log conversion
//!
//! Drives `parse_raw_log` with arbitrary text and filter settings and
//! verifies:
//! - No panics (slicing around `PWM:` / `Dist...:` markers)
//! - No kept sample exceeds the PWM limit
//! - Consecutive kept distances never jump by more than `delta_max_cm`
//!
//! cargo fuzz run fuzz_raw_log

#![no_main]

use libfuzzer_sys::fuzz_target;
use levitator::calibration::raw::parse_raw_log;
use levitator::config::SpikeFilterConfig;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let filter = SpikeFilterConfig {
        max_pwm: 200 + u16::from(data[0] % 56),
        delta_max_cm: 1.0 + f32::from(data[1] % 20),
    };
    let Ok(text) = core::str::from_utf8(&data[2..]) else {
        return;
    };
    let (samples, report) = parse_raw_log(text, &filter);
    assert!(samples.len() + report.saturated + report.spikes <= report.parsed);
    for s in &samples {
        assert!(s.pwm <= filter.max_pwm);
    }
    for pair in samples.windows(2) {
        assert!((pair[1].distance_cm - pair[0].distance_cm).abs() <= filter.delta_max_cm);
    }
});
