//! Application core: pure domain logic, zero I/O.
//!
//! The control arbiter, its operator commands and outbound events.  All
//! interaction with the link, the history log and the clock happens through
//! the **port traits** in [`ports`], keeping this layer testable without a
//! fan attached.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
