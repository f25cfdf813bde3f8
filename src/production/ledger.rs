//! Hour-boundary accounting.
//!
//! On every hour change the running count is folded into the ledger:
//!
//! - **No session:** everything counted since the last boundary becomes
//!   the hour's total, is added to the cumulative total, and the running
//!   count restarts at zero.
//! - **Session running:** the delta since the last boundary is added to the
//!   cumulative total but the running count is left alone, so the session's
//!   production count survives.  The boundary baseline moves up to the
//!   current count instead.
//!
//! Either way each unit is added to the cumulative total exactly once.

use core::fmt::{self, Write as _};

use log::{debug, info, warn};

use super::session::ProductionSession;
use crate::app::ports::StoragePort;
use crate::error::StorageError;
use crate::time::DateTime;

pub const COUNT_FILE: &str = "count.txt";
pub const HOURLY_FILE: &str = "hourly_count.txt";
pub const CUMULATIVE_FILE: &str = "cumulative_count.txt";
pub const BOUNDARY_FILE: &str = "boundary_baseline.txt";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HourLedger {
    /// Total of the last completed hour.
    pub hourly_count: u32,
    /// Lifetime total.  Only grows, except on an explicit reset.
    pub cumulative_count: u32,
    /// Running count at the last boundary crossed during a session.
    pub last_boundary_baseline: u32,
}

/// One line of the hourly log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourEntry {
    pub at: DateTime,
    pub delta: u32,
    pub cumulative: u32,
}

impl HourEntry {
    /// `HourLog_YYYYMMDD.txt`
    pub fn log_file_name(&self) -> heapless::String<32> {
        let mut s = heapless::String::new();
        let _ = write!(s, "HourLog_{}.txt", self.at.date_stamp());
        s
    }
}

impl fmt::Display for HourEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.at, self.delta, self.cumulative)
    }
}

#[derive(Debug, Default)]
pub struct HourAccountant {
    ledger: HourLedger,
}

impl HourAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger(&self) -> &HourLedger {
        &self.ledger
    }

    /// Load the ledger files at boot.  Missing files read as zero.  A
    /// boundary baseline above the running count is dropped.
    pub fn restore(&mut self, session: &ProductionSession, storage: &impl StoragePort) {
        let read = |name: &str| match storage.read_int(name) {
            Ok(v) => v,
            Err(StorageError::NotFound) => 0,
            Err(e) => {
                warn!("HOUR: {name} unreadable ({e}), using 0");
                0
            }
        };
        self.ledger.hourly_count = read(HOURLY_FILE);
        self.ledger.cumulative_count = read(CUMULATIVE_FILE);
        let baseline = read(BOUNDARY_FILE);
        self.ledger.last_boundary_baseline = if baseline > session.current_count() {
            warn!(
                "HOUR: boundary baseline {} above count {}, resetting",
                baseline,
                session.current_count()
            );
            0
        } else {
            baseline
        };
        debug!("HOUR: restored {:?}", self.ledger);
    }

    /// Fold the running count into the ledger.  Call once per polling tick;
    /// a no-op unless `hour_changed`.
    pub fn reconcile(
        &mut self,
        hour_changed: bool,
        session: &mut ProductionSession,
        at: DateTime,
        storage: &mut impl StoragePort,
    ) -> Option<HourEntry> {
        if !hour_changed {
            return None;
        }

        let current = session.current_count();
        let delta = current.saturating_sub(self.ledger.last_boundary_baseline);
        self.ledger.hourly_count = delta;
        self.ledger.cumulative_count = self.ledger.cumulative_count.saturating_add(delta);

        if session.is_active() {
            self.ledger.last_boundary_baseline = current;
            info!("HOUR: changed during production, {delta} carried, count preserved");
        } else {
            session.reset_count();
            self.ledger.last_boundary_baseline = 0;
            info!("HOUR: logged {delta}");
        }

        let entry = HourEntry {
            at,
            delta,
            cumulative: self.ledger.cumulative_count,
        };
        if let Err(e) = self.persist(session.current_count(), &entry, storage) {
            warn!("HOUR: ledger not saved: {e}");
        }
        Some(entry)
    }

    /// Zero the ledger.  An idle session's running count is zeroed too; a
    /// running session keeps its count and the boundary moves up to it, so
    /// the new cumulative total only sees units counted after the reset.
    pub fn reset(
        &mut self,
        session: &mut ProductionSession,
        storage: &mut impl StoragePort,
    ) -> Result<(), StorageError> {
        session.reset_count();
        self.ledger = HourLedger {
            last_boundary_baseline: session.current_count(),
            ..HourLedger::default()
        };
        if !storage.is_available() {
            return Err(StorageError::Unavailable);
        }
        storage.write_int(COUNT_FILE, session.current_count())?;
        storage.write_int(HOURLY_FILE, 0)?;
        storage.write_int(CUMULATIVE_FILE, 0)?;
        storage.write_int(BOUNDARY_FILE, self.ledger.last_boundary_baseline)
    }

    fn persist(
        &self,
        count: u32,
        entry: &HourEntry,
        storage: &mut impl StoragePort,
    ) -> Result<(), StorageError> {
        if !storage.is_available() {
            return Err(StorageError::Unavailable);
        }
        storage.write_int(COUNT_FILE, count)?;
        storage.write_int(HOURLY_FILE, self.ledger.hourly_count)?;
        storage.write_int(CUMULATIVE_FILE, self.ledger.cumulative_count)?;
        storage.write_int(BOUNDARY_FILE, self.ledger.last_boundary_baseline)?;

        let mut line: heapless::String<48> = heapless::String::new();
        write!(line, "{entry}").map_err(|_| StorageError::IoError)?;
        storage.append_record(&entry.log_file_name(), &line)
    }
}
