//! Inbound commands to the application service.
//!
//! These represent actions requested over the serial console that the
//! [`AppService`](super::service::AppService) interprets and acts upon.

use crate::config::SystemConfig;
use crate::time::DateTime;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Set the real-time clock.
    SetTime(DateTime),

    /// Zero the hourly and cumulative ledger (and the running count when
    /// no session is active).
    ResetCounts,

    /// Hot-reload configuration.  Rejected unless it validates.
    UpdateConfig(SystemConfig),
}

impl AppCommand {
    /// Parse one serial console line.
    ///
    /// ```text
    /// TIME,2025-11-12 08:30:00
    /// RESET
    /// ```
    ///
    /// Config updates have no console form.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (verb, arg) = line.split_once(',').unwrap_or((line, ""));
        if verb.eq_ignore_ascii_case("TIME") {
            DateTime::parse(arg).map(Self::SetTime)
        } else if verb.eq_ignore_ascii_case("RESET") && arg.is_empty() {
            Some(Self::ResetCounts)
        } else {
            None
        }
    }
}
