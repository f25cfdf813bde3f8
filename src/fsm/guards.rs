//! Transition guards.
//!
//! Pure predicates over a [`GuardContext`] snapshot.  Nothing here is cached:
//! every transition attempt re-reads the current health flags.

use log::debug;

use super::Mode;
use crate::error::HardwareFault;

/// Health and availability values reported by the hardware side.
///
/// Refreshed by the caller before each evaluation; the guards only read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardContext {
    pub heap_free_bytes: u32,
    pub clock_valid: bool,
    pub storage_available: bool,
    pub display_ready: bool,
}

impl Default for GuardContext {
    /// Pessimistic until the first hardware report arrives.
    fn default() -> Self {
        Self {
            heap_free_bytes: 0,
            clock_valid: false,
            storage_available: false,
            display_ready: false,
        }
    }
}

impl GuardContext {
    /// Everything healthy.  Handy for tests and the host simulation.
    pub const fn healthy() -> Self {
        Self {
            heap_free_bytes: u32::MAX,
            clock_valid: true,
            storage_available: true,
            display_ready: true,
        }
    }

    /// First degraded peripheral, if any, checked in the order the
    /// production guard cares about.
    pub fn first_fault(&self, min_free_heap_bytes: u32) -> Option<HardwareFault> {
        if !self.display_ready {
            Some(HardwareFault::DisplayUnavailable)
        } else if self.heap_free_bytes < min_free_heap_bytes {
            Some(HardwareFault::HeapLow)
        } else if !self.storage_available {
            Some(HardwareFault::StorageUnavailable)
        } else if !self.clock_valid {
            Some(HardwareFault::ClockInvalid)
        } else {
            None
        }
    }
}

/// Named guard predicates.
#[derive(Debug, Clone, Copy)]
pub struct GuardEvaluator {
    min_free_heap_bytes: u32,
}

impl GuardEvaluator {
    pub const fn new(min_free_heap_bytes: u32) -> Self {
        Self {
            min_free_heap_bytes,
        }
    }

    pub fn min_free_heap_bytes(&self) -> u32 {
        self.min_free_heap_bytes
    }

    pub fn heap_healthy(&self, ctx: &GuardContext) -> bool {
        ctx.heap_free_bytes >= self.min_free_heap_bytes
    }

    pub fn can_start_production(&self, ctx: &GuardContext, session_active: bool) -> bool {
        let ok = !session_active && ctx.display_ready && self.heap_healthy(ctx);
        if !ok {
            debug!(
                "guard: start refused (active={}, display={}, heap={})",
                session_active, ctx.display_ready, ctx.heap_free_bytes
            );
        }
        ok
    }

    /// Leaving Production is never refused.
    pub fn can_stop_production(&self) -> bool {
        true
    }

    pub fn can_enter_diagnostic(&self, mode: Mode) -> bool {
        mode == Mode::Ready
    }

    /// `record_valid` is the outcome of parsing and validating the
    /// persisted recovery record.
    pub fn can_recover(&self, ctx: &GuardContext, record_valid: bool) -> bool {
        ctx.storage_available && record_valid
    }

    /// Whether a session restored at boot may go straight back into
    /// Production.  Unlike a fresh start the session is already active.
    pub fn can_resume_production(&self, ctx: &GuardContext) -> bool {
        ctx.display_ready && self.heap_healthy(ctx)
    }

    /// Guard attached to the `from -> to` edge.  Edges without a named
    /// guard pass unconditionally.
    pub fn guard_for(&self, from: Mode, to: Mode, ctx: &GuardContext, session_active: bool) -> bool {
        match (from, to) {
            (_, Mode::Production) => self.can_start_production(ctx, session_active),
            (_, Mode::Diagnostic) => self.can_enter_diagnostic(from),
            (Mode::Production, Mode::Ready) => self.can_stop_production(),
            (_, Mode::Initialization | Mode::Ready | Mode::Error) => true,
        }
    }
}
