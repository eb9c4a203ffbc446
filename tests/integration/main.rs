//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host with no real link or
//! fan required.

mod arbiter_tests;
mod calibration_tests;
mod mock_hw;
mod runtime_tests;
