//! Mode handlers and table builder.
//!
//! ```text
//!  MANUAL ──[cycle]──▶ PROPORTIONAL ──[cycle]──▶ FUZZY
//!    ▲                                              │
//!    └───────────────────[cycle]────────────────────┘
//! ```

use super::context::ModeContext;
use super::{ControlMode, ModeDescriptor};
use log::info;

/// Build the static mode table.  Called once at startup.
pub fn build_mode_table() -> [ModeDescriptor; ControlMode::COUNT] {
    [
        // Index 0 — Manual
        ModeDescriptor {
            id: ControlMode::Manual,
            name: "Manual",
            on_enter: Some(manual_enter),
            on_exit: Some(manual_exit),
        },
        // Index 1 — Proportional
        ModeDescriptor {
            id: ControlMode::Proportional,
            name: "Proportional",
            on_enter: Some(automatic_enter),
            on_exit: None,
        },
        // Index 2 — Fuzzy
        ModeDescriptor {
            id: ControlMode::Fuzzy,
            name: "Fuzzy",
            on_enter: Some(fuzzy_enter),
            on_exit: Some(fuzzy_exit),
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  MANUAL
// ═══════════════════════════════════════════════════════════════════════════

fn manual_enter(ctx: &mut ModeContext) {
    // Hold whatever the fan was last told; no jump on entry.
    ctx.manual_armed = true;
    ctx.manual_power = ctx.last_dispatched;
    match ctx.manual_power {
        Some(p) => info!("MANUAL: holding {p:.1}%"),
        None => info!("MANUAL: no power dispatched yet"),
    }
}

fn manual_exit(ctx: &mut ModeContext) {
    ctx.manual_armed = false;
}

// ═══════════════════════════════════════════════════════════════════════════
//  PROPORTIONAL / FUZZY
// ═══════════════════════════════════════════════════════════════════════════

fn automatic_enter(ctx: &mut ModeContext) {
    ctx.manual_armed = false;
    ctx.manual_power = None;
}

fn fuzzy_enter(ctx: &mut ModeContext) {
    automatic_enter(ctx);
    ctx.smoothing_seed = ctx.last_dispatched;
}

fn fuzzy_exit(ctx: &mut ModeContext) {
    ctx.smoothing_seed = None;
}
