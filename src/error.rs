//! Unified error types for the production counter core.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! main loop's error handling uniform.  All variants are `Copy` so they can
//! be logged and returned without allocation.
//!
//! None of these are fatal.  Each is recovered locally by the component that
//! raises it; the only hard reset on the device comes from the watchdog.

use core::fmt;

use crate::fsm::Mode;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A mode change was refused.
    Transition(TransitionError),
    /// The event queue was full and an event was dropped.
    QueueSaturated,
    /// The persisted recovery record was absent or failed validation.
    Recovery(RecoveryError),
    /// A peripheral the operation depends on is unavailable.
    Hardware(HardwareFault),
    /// The storage collaborator failed.
    Storage(StorageError),
    /// Configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transition(e) => write!(f, "transition: {e}"),
            Self::QueueSaturated => write!(f, "event queue saturated"),
            Self::Recovery(e) => write!(f, "recovery: {e}"),
            Self::Hardware(e) => write!(f, "hardware: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transition errors
// ---------------------------------------------------------------------------

/// Why the state machine refused a requested mode change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: Mode,
    pub to: Mode,
    pub reason: Rejection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// `to` is not listed for `from` in the adjacency table.
    NotAdjacent,
    /// The target is adjacent but its guard evaluated false.
    GuardFailed,
    /// The machine is already in the requested mode.
    AlreadyInMode,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let why = match self.reason {
            Rejection::NotAdjacent => "not allowed",
            Rejection::GuardFailed => "guard failed",
            Rejection::AlreadyInMode => "already in mode",
        };
        write!(f, "{} -> {} {}", self.from, self.to, why)
    }
}

impl From<TransitionError> for Error {
    fn from(e: TransitionError) -> Self {
        Self::Transition(e)
    }
}

// ---------------------------------------------------------------------------
// Recovery errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryError {
    /// No recovery record on storage (normal boot).
    Missing,
    /// Storage is unavailable, so the record cannot be read.
    StorageUnavailable,
    /// Fewer than eight integers, or a field is not a number.
    Malformed,
    /// A field is outside its domain.  Carries the field name.
    OutOfRange(&'static str),
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "no recovery record"),
            Self::StorageUnavailable => write!(f, "storage unavailable"),
            Self::Malformed => write!(f, "malformed recovery record"),
            Self::OutOfRange(field) => write!(f, "{field} out of range"),
        }
    }
}

impl From<RecoveryError> for Error {
    fn from(e: RecoveryError) -> Self {
        Self::Recovery(e)
    }
}

// ---------------------------------------------------------------------------
// Hardware faults
// ---------------------------------------------------------------------------

/// Degraded peripherals.  These only ever show up in the guard context; the
/// system keeps counting with reduced capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareFault {
    ClockInvalid,
    StorageUnavailable,
    DisplayUnavailable,
    HeapLow,
}

impl fmt::Display for HardwareFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClockInvalid => write!(f, "RTC not valid"),
            Self::StorageUnavailable => write!(f, "SD card unavailable"),
            Self::DisplayUnavailable => write!(f, "display unavailable"),
            Self::HeapLow => write!(f, "free heap below threshold"),
        }
    }
}

impl From<HardwareFault> for Error {
    fn from(e: HardwareFault) -> Self {
        Self::Hardware(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Errors from [`StoragePort`](crate::app::ports::StoragePort) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Storage medium absent or not mounted.
    Unavailable,
    /// Requested file does not exist.
    NotFound,
    /// File exists but does not hold the expected content.
    Corrupted,
    /// Generic I/O error.
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "storage unavailable"),
            Self::NotFound => write!(f, "file not found"),
            Self::Corrupted => write!(f, "file corrupted"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.  Names the field and range.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
