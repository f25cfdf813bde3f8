//! Counter button and production latch inputs.
//!
//! ## Hardware
//!
//! Both inputs are active-low switches with external pull-ups.  The GPIO
//! ISR calls [`Debouncer::accept`] with the current millisecond tick and
//! enqueues an event only when it returns `true`:
//!
//! | Input   | Window (config)      | Event on accepted edge |
//! |---------|----------------------|------------------------|
//! | Counter | `debounce_ms`        | `CounterPressed`       |
//! | Latch   | `latch_debounce_ms`  | `LatchToggled`         |
//!
//! The latch ISR never decides start vs. stop.  The main loop reads the
//! settled level through [`LatchSwitch`] when it handles `LatchToggled`.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embedded_hal::digital::InputPin;
use log::warn;

use crate::app::ports::LatchPort;

/// Lock-free edge filter, safe to share between an ISR and the main loop.
pub struct Debouncer {
    window_ms: AtomicU32,
    last_ms: AtomicU32,
    primed: AtomicBool,
}

impl Debouncer {
    pub const fn new(window_ms: u32) -> Self {
        Self {
            window_ms: AtomicU32::new(window_ms),
            last_ms: AtomicU32::new(0),
            primed: AtomicBool::new(false),
        }
    }

    /// Whether an edge seen at `now_ms` is a real press.  Edges inside the
    /// window after the last accepted one are bounce.
    pub fn accept(&self, now_ms: u32) -> bool {
        let window = self.window_ms.load(Ordering::Relaxed);
        if self.primed.load(Ordering::Acquire) {
            let last = self.last_ms.load(Ordering::Acquire);
            if now_ms.wrapping_sub(last) < window {
                return false;
            }
        }
        self.last_ms.store(now_ms, Ordering::Release);
        self.primed.store(true, Ordering::Release);
        true
    }

    /// Change the window, e.g. after a config update.
    pub fn set_window_ms(&self, window_ms: u32) {
        self.window_ms.store(window_ms, Ordering::Relaxed);
    }

    pub fn window_ms(&self) -> u32 {
        self.window_ms.load(Ordering::Relaxed)
    }
}

/// Production latch read through any `embedded-hal` input pin.
pub struct LatchSwitch<P> {
    pin: P,
}

impl<P: InputPin> LatchSwitch<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P: InputPin> LatchPort for LatchSwitch<P> {
    fn latch_engaged(&mut self) -> bool {
        // Active low.  A read failure counts as released.
        match self.pin.is_low() {
            Ok(low) => low,
            Err(e) => {
                warn!("Latch: pin read failed: {:?}", e);
                false
            }
        }
    }
}
