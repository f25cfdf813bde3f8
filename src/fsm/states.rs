//! Mode table and per-mode timeout handlers.
//!
//! ```text
//!  INITIALIZATION ──▶ READY ◀──────────────┐
//!        │            │  │  ▲               │
//!        │     [start]│  │  │[stop]         │[self-test done / timeout]
//!        │            ▼  │  │               │
//!        │      PRODUCTION  └──── DIAGNOSTIC
//!        │            │              │
//!        └────────────┴──────┬───────┘
//!                            ▼
//!                          ERROR ──[recovery timeout]──▶ READY
//! ```
//!
//! Each row lists the modes reachable from it.  Anything not listed is
//! rejected by the engine before a guard is even consulted.

use super::{Mode, StateDescriptor, TickContext};
use log::{info, warn};

/// Build the static mode table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; Mode::COUNT] {
    [
        // Index 0 — Initialization
        StateDescriptor {
            id: Mode::Initialization,
            name: "Initialization",
            allowed: &[Mode::Ready, Mode::Error],
            on_update: Some(init_update),
        },
        // Index 1 — Ready
        StateDescriptor {
            id: Mode::Ready,
            name: "Ready",
            allowed: &[Mode::Production, Mode::Diagnostic, Mode::Error],
            on_update: None,
        },
        // Index 2 — Production
        StateDescriptor {
            id: Mode::Production,
            name: "Production",
            allowed: &[Mode::Ready, Mode::Error],
            on_update: None,
        },
        // Index 3 — Diagnostic
        StateDescriptor {
            id: Mode::Diagnostic,
            name: "Diagnostic",
            allowed: &[Mode::Ready, Mode::Error],
            on_update: Some(diagnostic_update),
        },
        // Index 4 — Error
        StateDescriptor {
            id: Mode::Error,
            name: "Error",
            allowed: &[Mode::Ready],
            on_update: Some(error_update),
        },
    ]
}

fn init_update(ctx: &TickContext) -> Option<Mode> {
    if ctx.elapsed_ms > u64::from(ctx.timeouts.init_ms) {
        warn!("INIT: startup exceeded {} ms", ctx.timeouts.init_ms);
        return Some(Mode::Error);
    }
    None
}

fn diagnostic_update(ctx: &TickContext) -> Option<Mode> {
    if ctx.elapsed_ms > u64::from(ctx.timeouts.diagnostic_ms) {
        warn!("DIAGNOSTIC: timed out after {} ms", ctx.elapsed_ms);
        return Some(Mode::Ready);
    }
    None
}

fn error_update(ctx: &TickContext) -> Option<Mode> {
    // A latched fatal error holds the device here until reset.
    if ctx.fatal_latched {
        return None;
    }
    if ctx.elapsed_ms > u64::from(ctx.timeouts.error_recovery_ms) {
        info!("ERROR: attempting automatic recovery");
        return Some(Mode::Ready);
    }
    None
}
