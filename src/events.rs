//! Interrupt-driven event system.
//!
//! Events are produced by:
//! - GPIO ISRs (counter button, latch switch, diagnostic button)
//! - Timer callbacks and peripheral probes (RTC, SD card, display)
//! - Software (serial commands, self-test results, fault reports)
//!
//! Events are consumed by the main loop, which handles them one at a time
//! in arrival order.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ GPIO ISR    │────▶│                  │     │              │
//! │ Timer ISR   │────▶│   EventQueue     │────▶│  Main Loop   │
//! │ Probes      │────▶│ (critical sect.) │     │  (consumer)  │
//! │ Software    │────▶│                  │     │              │
//! └─────────────┘     └──────────────────┘     └──────────────┘
//! ```
//!
//! The queue holds at most [`EVENT_QUEUE_CAP`] events.  When it is full the
//! **incoming** event is dropped; queued events are never evicted.  Drops
//! are counted and reported by the consumer, never logged from the ISR.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;

/// Maximum number of pending events.
pub const EVENT_QUEUE_CAP: usize = 16;

/// System event types.  Discriminants are grouped by subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Event {
    // ── Lifecycle ─────────────────────────────────────────
    StartupBegin = 0,
    StartupComplete = 1,
    StartupFailed = 2,

    // ── Production ────────────────────────────────────────
    /// Latch switch closed.
    ProductionStart = 10,
    /// Latch switch opened.
    ProductionStop = 11,
    /// Debounced counter button press.
    CounterPressed = 12,
    CountUpdated = 13,
    CountSaved = 14,
    /// Raw latch edge; the consumer reads the pin to resolve it.
    LatchToggled = 15,

    // ── Timing ────────────────────────────────────────────
    TimeUpdated = 20,
    HourChanged = 21,
    HourLogged = 22,

    // ── Hardware availability ─────────────────────────────
    RtcAvailable = 30,
    RtcUnavailable = 31,
    SdAvailable = 32,
    SdUnavailable = 33,
    DisplayAvailable = 34,
    DisplayUnavailable = 35,

    // ── Diagnostic ────────────────────────────────────────
    DiagnosticRequest = 40,
    DiagnosticComplete = 41,

    // ── Serial ────────────────────────────────────────────
    SerialCommand = 50,
    SerialTimeSet = 51,

    // ── State machine ─────────────────────────────────────
    EnterState = 60,
    ExitState = 61,
    StateTimeout = 62,

    // ── Errors ────────────────────────────────────────────
    ErrorDetected = 70,
    ErrorRecovered = 71,
    /// Latches the Error mode until reset.
    ErrorFatal = 72,
}

impl Event {
    /// Number of distinct events.
    pub const COUNT: usize = 28;

    /// Decode a raw discriminant, e.g. from a fuzz input or a test vector.
    pub fn from_u8(raw: u8) -> Option<Self> {
        let ev = match raw {
            0 => Self::StartupBegin,
            1 => Self::StartupComplete,
            2 => Self::StartupFailed,
            10 => Self::ProductionStart,
            11 => Self::ProductionStop,
            12 => Self::CounterPressed,
            13 => Self::CountUpdated,
            14 => Self::CountSaved,
            15 => Self::LatchToggled,
            20 => Self::TimeUpdated,
            21 => Self::HourChanged,
            22 => Self::HourLogged,
            30 => Self::RtcAvailable,
            31 => Self::RtcUnavailable,
            32 => Self::SdAvailable,
            33 => Self::SdUnavailable,
            34 => Self::DisplayAvailable,
            35 => Self::DisplayUnavailable,
            40 => Self::DiagnosticRequest,
            41 => Self::DiagnosticComplete,
            50 => Self::SerialCommand,
            51 => Self::SerialTimeSet,
            60 => Self::EnterState,
            61 => Self::ExitState,
            62 => Self::StateTimeout,
            70 => Self::ErrorDetected,
            71 => Self::ErrorRecovered,
            72 => Self::ErrorFatal,
            _ => return None,
        };
        Some(ev)
    }
}

// ── Bounded queue ─────────────────────────────────────────────
//
// The critical section only spans a single push or pop, so ISR latency
// stays bounded.  Handlers run with interrupts enabled.

struct Inner {
    buf: Deque<Event, EVENT_QUEUE_CAP>,
    dropped: u32,
}

/// Bounded FIFO between interrupt context (producer) and the main loop
/// (single consumer).
pub struct EventQueue {
    inner: Mutex<RefCell<Inner>>,
}

impl EventQueue {
    /// `const` so the binary can keep the ISR-visible queue in a `static`.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                buf: Deque::new(),
                dropped: 0,
            })),
        }
    }

    /// Push an event.  Safe to call from ISR context: never blocks, never
    /// allocates.  Returns `false` if the queue was full and `event` was
    /// dropped.
    pub fn enqueue(&self, event: Event) -> bool {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if inner.buf.push_back(event).is_ok() {
                true
            } else {
                inner.dropped = inner.dropped.saturating_add(1);
                false
            }
        })
    }

    /// Like [`enqueue`](Self::enqueue) but reports saturation as an error.
    pub fn try_enqueue(&self, event: Event) -> crate::error::Result<()> {
        if self.enqueue(event) {
            Ok(())
        } else {
            Err(crate::error::Error::QueueSaturated)
        }
    }

    /// Pop the oldest event.
    pub fn dequeue(&self) -> Option<Event> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).buf.pop_front())
    }

    /// Pop events in FIFO order until the queue is empty.  The handler runs
    /// outside the critical section, so ISRs may enqueue meanwhile.
    pub fn drain(&self, mut handler: impl FnMut(Event)) {
        while let Some(event) = self.dequeue() {
            handler(event);
        }
    }

    /// Number of events dropped since the last call.  Resets the counter.
    pub fn take_dropped(&self) -> u32 {
        critical_section::with(|cs| core::mem::take(&mut self.inner.borrow_ref_mut(cs).dropped))
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow_ref(cs).buf.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn capacity(&self) -> usize {
        EVENT_QUEUE_CAP
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
