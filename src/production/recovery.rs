//! Durable mirror of an active session.
//!
//! The record is eight newline-terminated ASCII integers:
//!
//! ```text
//! currentCount
//! baselineCount
//! year
//! month
//! day
//! hour
//! minute
//! second
//! ```
//!
//! It exists on storage exactly while a session is active.  At boot it is
//! read once; anything that fails validation is discarded.

use core::fmt::Write as _;

use crate::app::ports::{MAX_READ_LEN, StoragePort};
use crate::error::{RecoveryError, StorageError};
use crate::time::DateTime;

/// File name of the recovery record.
pub const RECOVERY_FILE: &str = "prod_session.txt";

const FIELD_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryRecord {
    pub current_count: u32,
    pub baseline_count: u32,
    pub started: DateTime,
}

impl RecoveryRecord {
    /// Items produced in the session this record describes.
    pub fn production_count(&self) -> u32 {
        self.current_count.saturating_sub(self.baseline_count)
    }

    /// Every field inside its domain.  Parsed records always are; this
    /// guards records built in code.
    pub fn is_valid(&self) -> bool {
        self.started.is_valid() && self.baseline_count <= self.current_count
    }

    pub fn encode(&self) -> heapless::String<96> {
        let mut s = heapless::String::new();
        let t = &self.started;
        // At most 8 x (10 digits + newline) = 88 bytes.
        let _ = write!(
            s,
            "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
            self.current_count,
            self.baseline_count,
            t.year,
            t.month,
            t.day,
            t.hour,
            t.minute,
            t.second
        );
        s
    }

    /// Parse and validate.  A current count above `max_count` is clamped
    /// rather than rejected.
    pub fn parse(text: &str, max_count: u32) -> Result<Self, RecoveryError> {
        let mut fields = [0u32; FIELD_COUNT];
        let mut tokens = text.split_whitespace();
        for slot in &mut fields {
            let tok = tokens.next().ok_or(RecoveryError::Malformed)?;
            *slot = tok.parse().map_err(|_| RecoveryError::Malformed)?;
        }
        let [current, baseline, year, month, day, hour, minute, second] = fields;

        let narrow = |v: u32, field: &'static str| u8::try_from(v).map_err(|_| RecoveryError::OutOfRange(field));
        let started = DateTime::new(
            u16::try_from(year).map_err(|_| RecoveryError::OutOfRange("year"))?,
            narrow(month, "month")?,
            narrow(day, "day")?,
            narrow(hour, "hour")?,
            narrow(minute, "minute")?,
            narrow(second, "second")?,
        );
        started.validate().map_err(RecoveryError::OutOfRange)?;

        if baseline > current {
            return Err(RecoveryError::OutOfRange("baseline"));
        }

        let current_count = current.min(max_count);
        Ok(Self {
            current_count,
            baseline_count: baseline.min(current_count),
            started,
        })
    }

    /// Read the record from storage and validate it.
    pub fn load(storage: &impl StoragePort, max_count: u32) -> Result<Self, RecoveryError> {
        if !storage.is_available() {
            return Err(RecoveryError::StorageUnavailable);
        }
        if !storage.exists(RECOVERY_FILE) {
            return Err(RecoveryError::Missing);
        }
        let mut buf = [0u8; MAX_READ_LEN];
        let len = storage.read_text(RECOVERY_FILE, &mut buf).map_err(|e| match e {
            StorageError::NotFound => RecoveryError::Missing,
            StorageError::Unavailable => RecoveryError::StorageUnavailable,
            StorageError::Corrupted | StorageError::IoError => RecoveryError::Malformed,
        })?;
        let text = core::str::from_utf8(&buf[..len]).map_err(|_| RecoveryError::Malformed)?;
        Self::parse(text, max_count)
    }

    pub fn store(&self, storage: &mut impl StoragePort) -> Result<(), StorageError> {
        storage.write_text(RECOVERY_FILE, &self.encode())
    }

    pub fn clear(storage: &mut impl StoragePort) -> Result<(), StorageError> {
        storage.delete_file(RECOVERY_FILE)
    }
}
