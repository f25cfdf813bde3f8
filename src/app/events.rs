//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, mirror to the display,
//! append to an SD audit trail, etc.

use crate::diagnostics::SelfTestReport;
use crate::error::TransitionError;
use crate::fsm::Mode;
use crate::production::{HourEntry, SessionSummary};
use crate::time::DateTime;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The application service has started (carries initial mode).
    Started(Mode),

    /// The state machine moved between modes.
    StateChanged { from: Mode, to: Mode },

    /// A requested mode change was refused.
    TransitionRejected(TransitionError),

    SessionStarted { at: DateTime, baseline: u32 },

    SessionStopped(SessionSummary),

    /// An interrupted session was resumed at boot.
    SessionRecovered { production_count: u32 },

    /// Periodic save wrote the running count.
    CountSaved(u32),

    HourLogged(HourEntry),

    DiagnosticFinished(SelfTestReport),

    /// Events lost to a full queue since the last report.
    EventsDropped(u32),

    TimeSet(DateTime),

    CountsReset,

    ConfigUpdated,
}
