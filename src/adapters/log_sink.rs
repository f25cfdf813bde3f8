//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(mode) => {
                info!("START | initial_mode={}", mode);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from, to);
            }
            AppEvent::TransitionRejected(e) => {
                warn!("STATE | rejected: {}", e);
            }
            AppEvent::SessionStarted { at, baseline } => {
                info!("SESSION | started {} | baseline={}", at, baseline);
            }
            AppEvent::SessionStopped(s) => {
                info!(
                    "SESSION | stopped {} | started={} | produced={}",
                    s.stopped, s.started, s.production_count
                );
            }
            AppEvent::SessionRecovered { production_count } => {
                info!("SESSION | recovered | produced={}", production_count);
            }
            AppEvent::CountSaved(count) => {
                info!("COUNT | saved {}", count);
            }
            AppEvent::HourLogged(entry) => {
                info!(
                    "HOUR | {} | delta={} | cumulative={}",
                    entry.at, entry.delta, entry.cumulative
                );
            }
            AppEvent::DiagnosticFinished(report) => {
                info!("DIAG | {}", report);
            }
            AppEvent::EventsDropped(n) => {
                warn!("QUEUE | {} event(s) dropped", n);
            }
            AppEvent::TimeSet(dt) => {
                info!("TIME | set to {}", dt);
            }
            AppEvent::CountsReset => {
                info!("COUNT | reset");
            }
            AppEvent::ConfigUpdated => {
                info!("CONFIG | updated");
            }
        }
    }
}
