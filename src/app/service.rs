//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the state machine, guards, production session and
//! hour ledger.  It exposes a hardware-agnostic API.  All I/O flows through
//! port traits injected at call sites, making the entire service testable
//! with mock adapters.
//!
//! ```text
//!  EventQueue ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │          AppService          │
//!  HardwarePorts ◀│ FSM · Guards · Session · Hour│
//!                 └──────────────────────────────┘
//! ```
//!
//! Mode and session always agree: entering Production starts a session
//! (unless one was recovered), and leaving Production for any reason stops
//! it.

use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::error::{Error, HardwareFault, Result, StorageError};
use crate::events::{Event, EventQueue};
use crate::fsm::guards::{GuardContext, GuardEvaluator};
use crate::fsm::{Mode, StateMachine, Timeouts};
use crate::production::ledger::COUNT_FILE;
use crate::production::{HourAccountant, HourLedger, ProductionSession};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{EventSink, HardwarePorts};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: StateMachine,
    guards: GuardEvaluator,
    health: GuardContext,
    session: ProductionSession,
    hours: HourAccountant,
    config: SystemConfig,
    /// Running count changed since the last save.
    count_dirty: bool,
    last_save_ms: u64,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Starts in Initialization; call [`boot`](Self::boot) next.
    pub fn new(config: SystemConfig) -> Self {
        Self {
            fsm: StateMachine::new(Timeouts::from(&config)),
            guards: GuardEvaluator::new(config.min_free_heap_bytes),
            health: GuardContext::default(),
            session: ProductionSession::new(config.max_count),
            hours: HourAccountant::new(),
            config,
            count_dirty: false,
            last_save_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load persisted counts, resume an interrupted session, and leave
    /// Initialization.
    ///
    /// Refresh the health snapshot with [`set_health`](Self::set_health)
    /// first: recovery and the Production resume are guarded by it.
    pub fn boot(&mut self, hw: &mut impl HardwarePorts, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started(self.fsm.mode()));
        info!("AppService booting, config {}", self.config_summary());

        if hw.is_available() {
            let count = match hw.read_int(COUNT_FILE) {
                Ok(v) if v > self.config.max_count => {
                    warn!("BOOT: stored count {v} above max, resetting to 0");
                    0
                }
                Ok(v) => v,
                Err(StorageError::NotFound) => 0,
                Err(e) => {
                    warn!("BOOT: count file unreadable ({e}), starting at 0");
                    0
                }
            };
            self.session.restore_count(count);
        } else {
            warn!("BOOT: storage unavailable, counts start at 0");
        }

        if let Ok(production_count) = self.session.recover(&self.guards, &self.health, hw) {
            sink.emit(&AppEvent::SessionRecovered { production_count });
        }
        // The boundary baseline is checked against the recovered count,
        // which may differ from count.txt.
        if hw.is_available() {
            self.hours.restore(&self.session, &*hw);
        }

        self.handle_event(Event::StartupComplete, hw, sink);
    }

    // ── Event handling ────────────────────────────────────────

    /// Drain the queue in FIFO order.  Drops since the last drain are
    /// reported first.
    pub fn drain(&mut self, queue: &EventQueue, hw: &mut impl HardwarePorts, sink: &mut impl EventSink) {
        let dropped = queue.take_dropped();
        if dropped > 0 {
            warn!("EVENTS: queue full, {dropped} event(s) dropped");
            sink.emit(&AppEvent::EventsDropped(dropped));
        }
        queue.drain(|event| self.handle_event(event, hw, sink));
    }

    /// Route one event.
    pub fn handle_event(&mut self, event: Event, hw: &mut impl HardwarePorts, sink: &mut impl EventSink) {
        debug!("EVENT: {:?} in {}", event, self.fsm.mode());
        match event {
            Event::StartupBegin => {}
            Event::StartupComplete => self.finish_startup(hw, sink),
            Event::StartupFailed => {
                self.change_mode(Mode::Error, hw, sink);
            }

            Event::LatchToggled => {
                let resolved = if hw.latch_engaged() {
                    Event::ProductionStart
                } else {
                    Event::ProductionStop
                };
                self.handle_event(resolved, hw, sink);
            }
            Event::ProductionStart => {
                if self.fsm.mode() != Mode::Production {
                    self.change_mode(Mode::Production, hw, sink);
                }
            }
            Event::ProductionStop => {
                if self.fsm.mode() == Mode::Production {
                    self.change_mode(Mode::Ready, hw, sink);
                }
            }
            Event::CounterPressed => {
                if self.fsm.mode() == Mode::Production && self.session.increment_count() {
                    self.count_dirty = true;
                    self.notify_display(hw);
                }
            }
            Event::CountUpdated => self.notify_display(hw),

            Event::RtcAvailable => self.health.clock_valid = true,
            Event::RtcUnavailable => self.health.clock_valid = false,
            Event::SdAvailable => self.health.storage_available = true,
            Event::SdUnavailable => self.health.storage_available = false,
            Event::DisplayAvailable => self.health.display_ready = true,
            Event::DisplayUnavailable => self.health.display_ready = false,

            Event::DiagnosticRequest => {
                self.change_mode(Mode::Diagnostic, hw, sink);
            }
            Event::DiagnosticComplete => {
                if self.fsm.mode() == Mode::Diagnostic {
                    self.change_mode(Mode::Ready, hw, sink);
                }
            }

            Event::ErrorDetected => {
                if self.fsm.mode() != Mode::Error {
                    self.change_mode(Mode::Error, hw, sink);
                }
            }
            Event::ErrorRecovered => {
                if self.fsm.mode() == Mode::Error && !self.fsm.is_fatal_latched() {
                    self.change_mode(Mode::Ready, hw, sink);
                }
            }
            Event::ErrorFatal => {
                self.fsm.latch_fatal();
                if self.fsm.mode() != Mode::Error {
                    self.change_mode(Mode::Error, hw, sink);
                }
                warn!("ERROR: fatal error latched, waiting for reset");
            }

            // Informational only: hour changes are detected in `poll`, and
            // serial payloads arrive through `handle_command`.
            Event::CountSaved
            | Event::TimeUpdated
            | Event::HourChanged
            | Event::HourLogged
            | Event::SerialCommand
            | Event::SerialTimeSet
            | Event::EnterState
            | Event::ExitState
            | Event::StateTimeout => {}
        }
    }

    // ── Periodic work ─────────────────────────────────────────

    /// Call once per main-loop iteration: mode timeouts, hour accounting
    /// and the periodic count save.
    pub fn poll(&mut self, now_ms: u64, hw: &mut impl HardwarePorts, sink: &mut impl EventSink) {
        if let Some(to) = self.fsm.poll(now_ms) {
            let from = self.fsm.previous().unwrap_or(to);
            self.on_mode_changed(from, to, hw, sink);
        }

        // Hour accounting needs a trustworthy clock.
        if let Some(now) = hw.now() {
            let changed = hw.hour_boundary_occurred();
            if let Some(entry) = self.hours.reconcile(changed, &mut self.session, now, hw) {
                sink.emit(&AppEvent::HourLogged(entry));
                // Reconcile only writes the ledger files; the recovery
                // record must catch up with the carried count.
                self.count_dirty = true;
                self.last_save_ms = now_ms;
                self.save_count(hw, sink);
                self.notify_display(hw);
            }
        }

        if self.count_dirty
            && now_ms.saturating_sub(self.last_save_ms) >= u64::from(self.config.save_interval_ms)
        {
            self.last_save_ms = now_ms;
            self.save_count(hw, sink);
        }
    }

    /// Write the running count and session checkpoint now if anything
    /// changed.  Call before a planned reset.
    pub fn flush(&mut self, hw: &mut impl HardwarePorts, sink: &mut impl EventSink) {
        if self.count_dirty {
            self.save_count(hw, sink);
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (serial console).
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl HardwarePorts,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        match cmd {
            AppCommand::SetTime(dt) => {
                if !dt.is_valid() {
                    return Err(Error::Hardware(HardwareFault::ClockInvalid));
                }
                hw.set_time(dt)?;
                self.health.clock_valid = true;
                info!("Clock set to {dt}");
                sink.emit(&AppEvent::TimeSet(dt));
            }
            AppCommand::ResetCounts => {
                let result = self.hours.reset(&mut self.session, hw);
                self.count_dirty = false;
                sink.emit(&AppEvent::CountsReset);
                self.notify_display(hw);
                info!("Counts reset");
                result?;
            }
            AppCommand::UpdateConfig(new_config) => {
                new_config.validate()?;
                self.guards = GuardEvaluator::new(new_config.min_free_heap_bytes);
                self.session.set_max_count(new_config.max_count);
                self.fsm.set_timeouts(Timeouts::from(&new_config));
                self.config = new_config;
                info!("Configuration updated at runtime");
                sink.emit(&AppEvent::ConfigUpdated);
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.fsm.mode()
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.fsm
    }

    pub fn session(&self) -> &ProductionSession {
        &self.session
    }

    pub fn ledger(&self) -> &HourLedger {
        self.hours.ledger()
    }

    pub fn health(&self) -> &GuardContext {
        &self.health
    }

    /// Replace the health snapshot (called each loop with fresh readings).
    pub fn set_health(&mut self, health: GuardContext) {
        self.health = health;
    }

    /// Update only the heap figure, keeping the availability flags that
    /// events maintain.
    pub fn set_heap_free(&mut self, bytes: u32) {
        self.health.heap_free_bytes = bytes;
    }

    /// Clone of the live configuration.
    pub fn current_config(&self) -> SystemConfig {
        self.config.clone()
    }

    pub fn is_count_dirty(&self) -> bool {
        self.count_dirty
    }

    // ── Internal ──────────────────────────────────────────────

    fn finish_startup(&mut self, hw: &mut impl HardwarePorts, sink: &mut impl EventSink) {
        if self.fsm.mode() != Mode::Initialization {
            return;
        }
        if !self.change_mode(Mode::Ready, hw, sink) {
            return;
        }
        if !self.session.is_active() {
            return;
        }

        // A recovered session is already active, so the normal start guard
        // would refuse it.
        let ok = self.guards.can_resume_production(&self.health);
        match self.fsm.try_transition(Mode::Production, ok) {
            Ok(()) => self.on_mode_changed(Mode::Ready, Mode::Production, hw, sink),
            Err(e) => {
                warn!("BOOT: cannot resume recovered session ({e}), closing it");
                sink.emit(&AppEvent::TransitionRejected(e));
                self.stop_session(hw, sink);
            }
        }
    }

    /// Guarded transition plus entry/exit side effects.
    fn change_mode(&mut self, target: Mode, hw: &mut impl HardwarePorts, sink: &mut impl EventSink) -> bool {
        let from = self.fsm.mode();
        let guard_ok = self
            .guards
            .guard_for(from, target, &self.health, self.session.is_active());
        match self.fsm.try_transition(target, guard_ok) {
            Ok(()) => {
                self.on_mode_changed(from, target, hw, sink);
                true
            }
            Err(e) => {
                warn!("FSM: {e}");
                if let Some(fault) = self.health.first_fault(self.guards.min_free_heap_bytes()) {
                    debug!("FSM: degraded: {fault}");
                }
                sink.emit(&AppEvent::TransitionRejected(e));
                false
            }
        }
    }

    fn on_mode_changed(&mut self, from: Mode, to: Mode, hw: &mut impl HardwarePorts, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::StateChanged { from, to });

        if from == Mode::Production && self.session.is_active() {
            self.stop_session(hw, sink);
        }

        match to {
            Mode::Production if !self.session.is_active() => {
                let now = hw.now();
                if self.session.start_session(&self.guards, &self.health, now, hw) {
                    sink.emit(&AppEvent::SessionStarted {
                        at: self.session.started().unwrap_or(crate::time::DateTime::FALLBACK),
                        baseline: self.session.baseline_count(),
                    });
                } else {
                    warn!("SESSION: start refused after entering Production, backing out");
                    self.change_mode(Mode::Ready, hw, sink);
                    return;
                }
            }
            Mode::Diagnostic => {
                let report = hw.run_self_test();
                info!("DIAGNOSTIC: {report}");
                sink.emit(&AppEvent::DiagnosticFinished(report));
                let next = if report.passed() { Mode::Ready } else { Mode::Error };
                self.change_mode(next, hw, sink);
                return;
            }
            Mode::Error => self.flush(hw, sink),
            _ => {}
        }

        self.notify_display(hw);
    }

    fn stop_session(&mut self, hw: &mut impl HardwarePorts, sink: &mut impl EventSink) {
        let now = hw.now();
        if let Some(summary) = self.session.stop_session(now, hw) {
            sink.emit(&AppEvent::SessionStopped(summary));
        }
        // Stays dirty until a save with storage online has deleted the
        // recovery record.
        self.count_dirty = true;
        self.save_count(hw, sink);
    }

    fn save_count(&mut self, hw: &mut impl HardwarePorts, sink: &mut impl EventSink) {
        if !hw.is_available() {
            debug!("SAVE: storage unavailable, keeping count dirty");
            return;
        }
        let count = self.session.current_count();
        let result = hw
            .write_int(COUNT_FILE, count)
            .and_then(|()| self.session.checkpoint(hw));
        match result {
            Ok(()) => {
                self.count_dirty = false;
                sink.emit(&AppEvent::CountSaved(count));
            }
            Err(e) => warn!("SAVE: count not saved: {e}"),
        }
    }

    fn notify_display(&self, hw: &mut impl HardwarePorts) {
        hw.notify(self.fsm.mode(), self.session.current_count());
    }

    fn config_summary(&self) -> String {
        self.config
            .to_json()
            .unwrap_or_else(|e| format!("<unserialisable: {e}>"))
    }
}
