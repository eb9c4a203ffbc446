//! Levitator control library.
//!
//! Holds a light object at a requested height inside a vertical tube by
//! driving a fan from distance readings.  Two control laws (a Mamdani fuzzy
//! controller and a proportional one) sit behind a three-mode arbiter with a
//! manual override; history logs feed an offline recalibration that
//! reshapes the fuzzy controller.
//!
//! The pure-logic modules (`control`, `fsm`, `calibration`, `app`) do no
//! I/O.  `adapters` and `runtime` connect them to files, pipes and threads.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod calibration;
pub mod config;
pub mod control;
pub mod error;
pub mod fsm;
pub mod runtime;
pub mod sensors;
