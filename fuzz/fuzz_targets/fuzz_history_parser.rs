//! Fuzz target: history log parser
//!
//! Feeds arbitrary text to `parse_history` and verifies:
//! - No panics on malformed UTF-8 boundaries, huge numbers or odd columns
//! - Every accepted record re-serialises to a line that parses again
//! - Accepted + skipped never exceeds the number of input lines
//!
//! cargo fuzz run fuzz_history_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use levitator::calibration::history::{HistoryRecord, parse_history};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let parsed = parse_history(text);
    assert!(parsed.records.len() + parsed.skipped <= text.lines().count());

    for record in &parsed.records {
        assert!(record.distance_cm.is_finite());
        assert!(record.power_pct.is_finite());
        let again = HistoryRecord::parse_line(&record.to_line());
        assert!(again.is_ok(), "re-parse failed for {:?}", record);
    }
});
