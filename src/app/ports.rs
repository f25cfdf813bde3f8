//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (storage, clock, display, self-test, event sinks)
//! implement these traits.  The [`AppService`](super::service::AppService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! ## Storage notes
//!
//! - The SD card shares its SPI bus with other peripherals.  Chip-select
//!   handling belongs to the driver underneath a [`StoragePort`]; the core
//!   never manipulates it.
//! - `write_text` MUST replace the whole file or leave the old content in
//!   place.  A torn recovery record is treated as corrupt and discarded.

use core::fmt::Write as _;

use crate::diagnostics::SelfTestReport;
use crate::fsm::Mode;
use crate::time::DateTime;

pub use crate::error::{HardwareFault, StorageError};

/// Largest file the core ever reads back (the recovery record).
pub const MAX_READ_LEN: usize = 128;

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ SD card filesystem)
// ───────────────────────────────────────────────────────────────

/// Flat, name-addressed file storage.
pub trait StoragePort {
    /// Whether the medium is mounted and usable.
    fn is_available(&self) -> bool;

    /// Read a whole file.  Returns the number of bytes written to `buf`.
    fn read_text(&self, name: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Replace a file's content atomically.
    fn write_text(&mut self, name: &str, text: &str) -> Result<(), StorageError>;

    /// Append one line (a trailing newline is added).
    fn append_record(&mut self, name: &str, line: &str) -> Result<(), StorageError>;

    /// Delete a file.  Returns `Ok(())` even if it didn't exist.
    fn delete_file(&mut self, name: &str) -> Result<(), StorageError>;

    /// Check whether a file exists without reading it.
    fn exists(&self, name: &str) -> bool;

    /// Read a file holding a single decimal integer.
    fn read_int(&self, name: &str) -> Result<u32, StorageError> {
        let mut buf = [0u8; 16];
        let len = self.read_text(name, &mut buf)?;
        let text = core::str::from_utf8(&buf[..len]).map_err(|_| StorageError::Corrupted)?;
        text.trim().parse().map_err(|_| StorageError::Corrupted)
    }

    /// Write a single integer followed by a newline.
    fn write_int(&mut self, name: &str, value: u32) -> Result<(), StorageError> {
        let mut s: heapless::String<12> = heapless::String::new();
        writeln!(s, "{value}").map_err(|_| StorageError::IoError)?;
        self.write_text(name, &s)
    }
}

// ───────────────────────────────────────────────────────────────
// Time port (driven adapter: RTC → domain)
// ───────────────────────────────────────────────────────────────

pub trait TimePort {
    /// Current wall-clock time, or `None` while the clock is not valid.
    fn now(&self) -> Option<DateTime>;

    /// `true` exactly once after the wall-clock hour changes.  The first
    /// call after boot or after [`set_time`](Self::set_time) only primes
    /// the detector.
    fn hour_boundary_occurred(&mut self) -> bool;

    /// Set the clock (serial time-set command).
    fn set_time(&mut self, dt: DateTime) -> Result<(), HardwareFault>;
}

// ───────────────────────────────────────────────────────────────
// Display port (driven adapter: domain → screen)
// ───────────────────────────────────────────────────────────────

/// Fire-and-forget status updates.  Rendering is the adapter's business.
pub trait DisplayPort {
    fn notify(&mut self, mode: Mode, count: u32);
}

// ───────────────────────────────────────────────────────────────
// Self-test port
// ───────────────────────────────────────────────────────────────

/// Runs the hardware self-test routines.  Only the outcome matters here.
pub trait SelfTestPort {
    fn run_self_test(&mut self) -> SelfTestReport;
}

// ───────────────────────────────────────────────────────────────
// Latch port (driven adapter: production switch → domain)
// ───────────────────────────────────────────────────────────────

/// Level of the production latch switch.  The ISR only reports that the
/// switch moved; the main loop reads the settled level through this port.
pub trait LatchPort {
    /// `true` while the latch is held closed (production requested).
    fn latch_engaged(&mut self) -> bool;
}

/// Everything [`AppService`](super::service::AppService) needs from the
/// board, bundled so call sites take a single `&mut hw`.
pub trait HardwarePorts: StoragePort + TimePort + DisplayPort + SelfTestPort + LatchPort {}

impl<T> HardwarePorts for T where T: StoragePort + TimePort + DisplayPort + SelfTestPort + LatchPort {}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
