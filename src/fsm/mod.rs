//! Table-driven mode state machine.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  StateTable                                                │
//! │  ┌────────────────┬──────────────────────┬──────────────┐  │
//! │  │ Mode           │ allowed targets      │ on_update    │  │
//! │  ├────────────────┼──────────────────────┼──────────────┤  │
//! │  │ Initialization │ Ready, Error         │ init timeout │  │
//! │  │ Ready          │ Production, Diag, Err│ -            │  │
//! │  │ Production     │ Ready, Error         │ -            │  │
//! │  │ Diagnostic     │ Ready, Error         │ diag timeout │  │
//! │  │ Error          │ Ready                │ auto-recover │  │
//! │  └────────────────┴──────────────────────┴──────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! A request succeeds only when the target is listed for the current mode
//! **and** the edge's guard (see [`guards::GuardEvaluator::guard_for`])
//! holds.  A rejected request leaves the mode untouched.
//!
//! `poll` runs the current row's `on_update`, which may ask for a timeout
//! transition.  Timeout transitions go through the same adjacency check.

pub mod guards;
pub mod states;

use core::fmt;

use guards::{GuardContext, GuardEvaluator};
use log::{info, warn};

use crate::config::SystemConfig;
use crate::error::{Rejection, TransitionError};

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// High-level operating mode.  Exactly one is active at any time.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Mode {
    Initialization = 0,
    Ready = 1,
    Production = 2,
    Diagnostic = 3,
    Error = 4,
}

impl Mode {
    /// Total number of modes, used to size the table array.
    pub const COUNT: usize = 5;

    pub const ALL: [Mode; Mode::COUNT] = [
        Mode::Initialization,
        Mode::Ready,
        Mode::Production,
        Mode::Diagnostic,
        Mode::Error,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Initialization => "Initialization",
            Self::Ready => "Ready",
            Self::Production => "Production",
            Self::Diagnostic => "Diagnostic",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Table types
// ---------------------------------------------------------------------------

/// Per-mode time limits in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub init_ms: u32,
    pub diagnostic_ms: u32,
    pub error_recovery_ms: u32,
}

impl From<&SystemConfig> for Timeouts {
    fn from(cfg: &SystemConfig) -> Self {
        Self {
            init_ms: cfg.init_timeout_ms,
            diagnostic_ms: cfg.diagnostic_timeout_ms,
            error_recovery_ms: cfg.error_recovery_ms,
        }
    }
}

/// What an `on_update` handler gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    /// Time spent in the current mode.
    pub elapsed_ms: u64,
    pub fatal_latched: bool,
    pub timeouts: Timeouts,
}

/// Per-tick handler.  Returns `Some(next)` to request a transition.
pub type StateUpdateFn = fn(&TickContext) -> Option<Mode>;

/// Static descriptor for a single mode.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: Mode,
    pub name: &'static str,
    /// Modes this one may move to.
    pub allowed: &'static [Mode],
    pub on_update: Option<StateUpdateFn>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns the current mode.  Starts in [`Mode::Initialization`].
pub struct StateMachine {
    table: [StateDescriptor; Mode::COUNT],
    current: Mode,
    previous: Option<Mode>,
    timeouts: Timeouts,
    fatal_latched: bool,
    transition_count: u32,
    /// Last time reported through `poll`.
    now_ms: u64,
    entered_at_ms: u64,
}

impl StateMachine {
    pub fn new(timeouts: Timeouts) -> Self {
        Self {
            table: states::build_state_table(),
            current: Mode::Initialization,
            previous: None,
            timeouts,
            fatal_latched: false,
            transition_count: 0,
            now_ms: 0,
            entered_at_ms: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.current
    }

    pub fn previous(&self) -> Option<Mode> {
        self.previous
    }

    pub fn transition_count(&self) -> u32 {
        self.transition_count
    }

    pub fn time_in_mode_ms(&self) -> u64 {
        self.now_ms.saturating_sub(self.entered_at_ms)
    }

    pub fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.timeouts = timeouts;
    }

    /// Hold the machine in Error until reset: automatic recovery is
    /// suppressed while latched.
    pub fn latch_fatal(&mut self) {
        self.fatal_latched = true;
    }

    pub fn is_fatal_latched(&self) -> bool {
        self.fatal_latched
    }

    /// Whether `to` appears in `from`'s row.
    pub fn is_allowed(&self, from: Mode, to: Mode) -> bool {
        self.table[from as usize].allowed.contains(&to)
    }

    /// Core check: adjacency first, then the caller-evaluated guard.
    pub fn try_transition(&mut self, target: Mode, guard_ok: bool) -> Result<(), TransitionError> {
        let from = self.current;
        let reason = if target == from {
            Some(Rejection::AlreadyInMode)
        } else if !self.is_allowed(from, target) {
            Some(Rejection::NotAdjacent)
        } else if !guard_ok {
            Some(Rejection::GuardFailed)
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(TransitionError {
                from,
                to: target,
                reason,
            });
        }

        info!(
            "FSM transition: {} -> {}",
            self.table[from as usize].name, self.table[target as usize].name
        );
        self.previous = Some(from);
        self.current = target;
        self.entered_at_ms = self.now_ms;
        self.transition_count = self.transition_count.wrapping_add(1);
        Ok(())
    }

    /// Evaluate the edge's guard and attempt the transition.  Rejections
    /// are logged and reported as `false`.
    pub fn request_transition(
        &mut self,
        target: Mode,
        guards: &GuardEvaluator,
        ctx: &GuardContext,
        session_active: bool,
    ) -> bool {
        let guard_ok = guards.guard_for(self.current, target, ctx, session_active);
        match self.try_transition(target, guard_ok) {
            Ok(()) => true,
            Err(e) => {
                warn!("FSM: {e}");
                false
            }
        }
    }

    /// Advance the clock and run the current mode's timeout handler.
    /// Returns the new mode when a timeout transition happened.
    pub fn poll(&mut self, now_ms: u64) -> Option<Mode> {
        self.now_ms = now_ms;
        let update = self.table[self.current as usize].on_update?;
        let tick = TickContext {
            elapsed_ms: self.time_in_mode_ms(),
            fatal_latched: self.fatal_latched,
            timeouts: self.timeouts,
        };
        let next = update(&tick)?;
        match self.try_transition(next, true) {
            Ok(()) => Some(next),
            Err(e) => {
                warn!("FSM: timeout transition refused: {e}");
                None
            }
        }
    }
}
