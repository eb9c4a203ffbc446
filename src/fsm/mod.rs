//! Function-pointer mode machine for the control arbiter.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  ModeTable                                   │
//! │  ┌──────────────┬───────────┬──────────┐     │
//! │  │ ControlMode  │ on_enter  │ on_exit  │     │
//! │  ├──────────────┼───────────┼──────────┤     │
//! │  │ Manual       │ fn(ctx)   │ fn(ctx)  │     │
//! │  │ Proportional │ fn(ctx)   │ fn(ctx)  │     │
//! │  │ Fuzzy        │ fn(ctx)   │ fn(ctx)  │     │
//! │  └──────────────┴───────────┴──────────┘     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Modes only change on an operator request.  The machine walks the fixed
//! cycle `Manual → Proportional → Fuzzy → Manual`, running `on_exit` of the
//! old mode and `on_enter` of the new one against a shared [`ModeContext`].

pub mod context;
pub mod states;

use context::ModeContext;
use log::info;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// Which source decides the fan power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ControlMode {
    /// Operator drives the fan directly; no controller runs.
    Manual = 0,
    Proportional = 1,
    Fuzzy = 2,
}

impl ControlMode {
    pub const COUNT: usize = 3;

    /// Next mode in the operator cycle.
    pub fn next(self) -> Self {
        match self {
            Self::Manual => Self::Proportional,
            Self::Proportional => Self::Fuzzy,
            Self::Fuzzy => Self::Manual,
        }
    }

    /// Lowercase name, as written to the history log.
    pub fn name(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Proportional => "proportional",
            Self::Fuzzy => "fuzzy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "manual" => Some(Self::Manual),
            "proportional" => Some(Self::Proportional),
            "fuzzy" => Some(Self::Fuzzy),
            _ => None,
        }
    }

    /// Convert a table index back to `ControlMode`.  Out-of-range indices
    /// map to `Manual`, the mode that never drives the fan on its own.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            1 => Self::Proportional,
            2 => Self::Fuzzy,
            0 => Self::Manual,
            _ => {
                debug_assert!(false, "invalid mode index: {idx}");
                Self::Manual
            }
        }
    }
}

impl core::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Mode descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type ModeActionFn = fn(&mut ModeContext);

pub struct ModeDescriptor {
    pub id: ControlMode,
    pub name: &'static str,
    pub on_enter: Option<ModeActionFn>,
    pub on_exit: Option<ModeActionFn>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ModeMachine {
    table: [ModeDescriptor; ControlMode::COUNT],
    current: usize,
    transitions: u64,
}

impl ModeMachine {
    pub fn new(table: [ModeDescriptor; ControlMode::COUNT], initial: ControlMode) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, d)| d.id as usize == i),
            "mode table out of order"
        );
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first transition.
    pub fn start(&mut self, ctx: &mut ModeContext) {
        info!("MODE starting in: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance to the next mode in the cycle.  Returns `(from, to)`.
    pub fn cycle(&mut self, ctx: &mut ModeContext) -> (ControlMode, ControlMode) {
        let from = self.current_mode();
        let to = from.next();
        self.transition(to, ctx);
        (from, to)
    }

    /// Jump straight to `next` (no-op when already there).
    pub fn force_transition(&mut self, next: ControlMode, ctx: &mut ModeContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_mode(&self) -> ControlMode {
        ControlMode::from_index(self.current)
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    fn transition(&mut self, next: ControlMode, ctx: &mut ModeContext) {
        let next_idx = next as usize;
        info!(
            "MODE transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions += 1;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
