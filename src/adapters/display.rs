//! Serial status display.
//!
//! Stands in for the panel on boards without one: prints a status line
//! whenever the mode or count shown would change.  Mode changes print at
//! once; count-only changes are held back to one line per refresh period
//! (`status_display_ms`) so a fast line does not flood the console.

use std::time::Instant;

use log::info;

use crate::app::ports::DisplayPort;
use crate::fsm::Mode;

#[derive(Debug)]
pub struct LogDisplay {
    refresh_ms: u64,
    boot: Instant,
    shown: Option<(Mode, u32)>,
    pending: Option<(Mode, u32)>,
    last_print_ms: u64,
}

impl LogDisplay {
    pub fn new(refresh_ms: u32) -> Self {
        Self {
            refresh_ms: u64::from(refresh_ms),
            boot: Instant::now(),
            shown: None,
            pending: None,
            last_print_ms: 0,
        }
    }

    /// What the display currently shows.
    pub fn shown(&self) -> Option<(Mode, u32)> {
        self.shown
    }

    pub fn set_refresh_ms(&mut self, refresh_ms: u32) {
        self.refresh_ms = u64::from(refresh_ms);
    }

    /// Print a held-back count once the refresh period is over.  Call from
    /// the main loop.
    pub fn tick(&mut self) {
        let now_ms = self.elapsed_ms();
        self.tick_at(now_ms);
    }

    fn elapsed_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }

    fn notify_at(&mut self, mode: Mode, count: u32, now_ms: u64) {
        if self.shown == Some((mode, count)) {
            self.pending = None;
            return;
        }
        let mode_changed = !matches!(self.shown, Some((m, _)) if m == mode);
        self.pending = Some((mode, count));
        if mode_changed {
            self.show(now_ms);
        } else {
            self.tick_at(now_ms);
        }
    }

    fn tick_at(&mut self, now_ms: u64) {
        if self.pending.is_some() && now_ms.saturating_sub(self.last_print_ms) >= self.refresh_ms {
            self.show(now_ms);
        }
    }

    fn show(&mut self, now_ms: u64) {
        let Some((mode, count)) = self.pending.take() else {
            return;
        };
        self.shown = Some((mode, count));
        self.last_print_ms = now_ms;
        info!("DISPLAY | {:<12} | count {:>5}", mode.name(), count);
    }
}

impl DisplayPort for LogDisplay {
    fn notify(&mut self, mode: Mode, count: u32) {
        let now_ms = self.elapsed_ms();
        self.notify_at(mode, count, now_ms);
    }
}
