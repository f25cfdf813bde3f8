//! Production session lifecycle.
//!
//! ```text
//!            start_session()                 stop_session()
//!  inactive ───────────────▶ active ─────────────────────────▶ inactive
//!     ▲       (record written)  │ increment_count()  (summary written,
//!     │                         │ checkpoint()        record deleted)
//!     └──── recover() at boot ──┘
//! ```
//!
//! The recovery record on storage mirrors `active`: written on start and on
//! every checkpoint, deleted on stop.  Storage failures are logged and
//! never stop counting.

use log::{debug, info, warn};

use super::recovery::{RECOVERY_FILE, RecoveryRecord};
use super::summary::SessionSummary;
use crate::app::ports::StoragePort;
use crate::error::{RecoveryError, StorageError};
use crate::fsm::guards::{GuardContext, GuardEvaluator};
use crate::time::DateTime;

#[derive(Debug, Clone)]
pub struct ProductionSession {
    active: bool,
    baseline_count: u32,
    current_count: u32,
    started: Option<DateTime>,
    stopped: Option<DateTime>,
    max_count: u32,
}

impl ProductionSession {
    pub fn new(max_count: u32) -> Self {
        Self {
            active: false,
            baseline_count: 0,
            current_count: 0,
            started: None,
            stopped: None,
            max_count,
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current_count(&self) -> u32 {
        self.current_count
    }

    pub fn baseline_count(&self) -> u32 {
        self.baseline_count
    }

    /// Items produced since the session started.
    pub fn production_count(&self) -> u32 {
        self.current_count.saturating_sub(self.baseline_count)
    }

    pub fn started(&self) -> Option<DateTime> {
        self.started
    }

    pub fn stopped(&self) -> Option<DateTime> {
        self.stopped
    }

    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    /// Change the ceiling.  A count already above it is pulled down.
    pub fn set_max_count(&mut self, max_count: u32) {
        self.max_count = max_count;
        self.current_count = self.current_count.min(max_count);
        self.baseline_count = self.baseline_count.min(self.current_count);
    }

    /// Seed the running count from storage at boot.  Ignored while active.
    pub fn restore_count(&mut self, count: u32) {
        if self.active {
            return;
        }
        self.current_count = count.min(self.max_count);
    }

    /// Zero the running tally (hour rollover with no session, or an
    /// explicit reset).  Ignored while active.
    pub fn reset_count(&mut self) {
        if self.active {
            return;
        }
        self.current_count = 0;
        self.baseline_count = 0;
    }

    /// Snapshot for the recovery record, if a session is running.
    pub fn record(&self) -> Option<RecoveryRecord> {
        self.active.then(|| RecoveryRecord {
            current_count: self.current_count,
            baseline_count: self.baseline_count,
            started: self.started.unwrap_or(DateTime::FALLBACK),
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Begin a session at the current count.  `now` is `None` when the
    /// clock is invalid; the session is then stamped with
    /// [`DateTime::FALLBACK`].
    pub fn start_session(
        &mut self,
        guards: &GuardEvaluator,
        ctx: &GuardContext,
        now: Option<DateTime>,
        storage: &mut impl StoragePort,
    ) -> bool {
        if !guards.can_start_production(ctx, self.active) {
            return false;
        }

        let started = now.unwrap_or_else(|| {
            warn!("SESSION: clock invalid, using fallback start stamp");
            DateTime::FALLBACK
        });
        self.active = true;
        self.baseline_count = self.current_count;
        self.started = Some(started);
        self.stopped = None;

        if let Err(e) = self.checkpoint(storage) {
            warn!("SESSION: recovery record not written: {e}");
        }
        info!(
            "SESSION: started at {} (baseline {})",
            started, self.baseline_count
        );
        true
    }

    /// End the running session and persist its summary.  Returns `None`
    /// if no session was active.
    pub fn stop_session(
        &mut self,
        now: Option<DateTime>,
        storage: &mut impl StoragePort,
    ) -> Option<SessionSummary> {
        if !self.active {
            return None;
        }

        let started = self.started.unwrap_or(DateTime::FALLBACK);
        let stopped = now.unwrap_or(started);
        let summary = SessionSummary {
            started,
            stopped,
            production_count: self.production_count(),
        };

        if storage.is_available() {
            if let Err(e) = summary.persist(storage) {
                warn!("SESSION: summary not saved: {e}");
            }
        }
        self.active = false;
        self.stopped = Some(stopped);
        if let Err(e) = RecoveryRecord::clear(storage) {
            warn!("SESSION: recovery record not deleted: {e}");
        }

        info!(
            "SESSION: stopped at {}, produced {}",
            stopped, summary.production_count
        );
        Some(summary)
    }

    /// Count one item.  Only while active; saturates at `max_count`.
    /// Returns `true` if the count changed.
    pub fn increment_count(&mut self) -> bool {
        if !self.active || self.current_count >= self.max_count {
            return false;
        }
        self.current_count += 1;
        true
    }

    /// Bring the recovery record in line with the session: rewrite it
    /// while active, delete a stale one while inactive.
    pub fn checkpoint(&self, storage: &mut impl StoragePort) -> Result<(), StorageError> {
        if !storage.is_available() {
            return Err(StorageError::Unavailable);
        }
        match self.record() {
            Some(record) => record.store(storage),
            None if storage.exists(RECOVERY_FILE) => RecoveryRecord::clear(storage),
            None => Ok(()),
        }
    }

    /// Resume a session interrupted by a reset.  Called once at boot.
    ///
    /// An invalid record is deleted and the session stays inactive.
    /// Returns the recovered production count.
    pub fn recover(
        &mut self,
        guards: &GuardEvaluator,
        ctx: &GuardContext,
        storage: &mut impl StoragePort,
    ) -> Result<u32, RecoveryError> {
        let loaded = RecoveryRecord::load(&*storage, self.max_count);
        if !guards.can_recover(ctx, loaded.as_ref().is_ok_and(RecoveryRecord::is_valid)) {
            let err = match loaded {
                Ok(_) => RecoveryError::StorageUnavailable,
                Err(e) => e,
            };
            match err {
                RecoveryError::Missing => debug!("SESSION: no session to recover"),
                RecoveryError::StorageUnavailable => {
                    warn!("SESSION: cannot check for interrupted session: {err}");
                }
                RecoveryError::Malformed | RecoveryError::OutOfRange(_) => {
                    warn!("SESSION: discarding recovery record: {err}");
                    if let Err(e) = RecoveryRecord::clear(storage) {
                        warn!("SESSION: stale record not deleted: {e}");
                    }
                }
            }
            return Err(err);
        }

        let record = loaded?;
        self.active = true;
        self.current_count = record.current_count;
        self.baseline_count = record.baseline_count;
        self.started = Some(record.started);
        self.stopped = None;

        let produced = self.production_count();
        info!(
            "SESSION: recovered session started {} ({} produced)",
            record.started, produced
        );
        Ok(produced)
    }
}
