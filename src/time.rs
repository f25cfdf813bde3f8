//! Wall-clock timestamps and hour-boundary detection.
//!
//! [`DateTime`] is the decomposed form the RTC reports and the recovery
//! record stores.  It deliberately does no calendar arithmetic; validity is
//! a per-field range check, which is all the recovery path needs.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Oldest year accepted from the RTC or a persisted record.
pub const MIN_YEAR: u16 = 2020;
/// Newest year accepted from the RTC or a persisted record.
pub const MAX_YEAR: u16 = 2100;

/// Decomposed wall-clock timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    /// Stamp used for a session started while the clock is invalid.
    /// It passes validation so the session remains recoverable.
    pub const FALLBACK: Self = Self {
        year: MIN_YEAR,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
    };

    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Check every field against its domain.  Returns the name of the first
    /// offending field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
            return Err("year");
        }
        if !(1..=12).contains(&self.month) {
            return Err("month");
        }
        if !(1..=31).contains(&self.day) {
            return Err("day");
        }
        if self.hour > 23 {
            return Err("hour");
        }
        if self.minute > 59 {
            return Err("minute");
        }
        if self.second > 59 {
            return Err("second");
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Parse `YYYY-MM-DD HH:MM:SS` (the serial time-set format).
    /// A `T` separator is accepted as well.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (date, time) = text.split_once([' ', 'T'])?;

        let mut d = date.split('-');
        let year = d.next()?.parse().ok()?;
        let month = d.next()?.parse().ok()?;
        let day = d.next()?.parse().ok()?;
        if d.next().is_some() {
            return None;
        }

        let mut t = time.split(':');
        let hour = t.next()?.parse().ok()?;
        let minute = t.next()?.parse().ok()?;
        let second = t.next()?.parse().ok()?;
        if t.next().is_some() {
            return None;
        }

        let dt = Self::new(year, month, day, hour, minute, second);
        dt.is_valid().then_some(dt)
    }

    /// `YYYYMMDD`, used in per-day file names.
    pub fn date_stamp(&self) -> heapless::String<8> {
        let mut s = heapless::String::new();
        let _ = fmt::Write::write_fmt(
            &mut s,
            format_args!("{:04}{:02}{:02}", self.year, self.month, self.day),
        );
        s
    }

    /// `HHMMSS`, used in per-session file names.
    pub fn time_stamp(&self) -> heapless::String<6> {
        let mut s = heapless::String::new();
        let _ = fmt::Write::write_fmt(
            &mut s,
            format_args!("{:02}{:02}{:02}", self.hour, self.minute, self.second),
        );
        s
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

// ---------------------------------------------------------------------------
// Hour boundary detection
// ---------------------------------------------------------------------------

/// Remembers the last observed hour and reports when it changes.
///
/// The first observation only primes the tracker: a boot or a clock
/// adjustment is not an hour boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct HourTracker {
    last_hour: Option<u8>,
}

impl HourTracker {
    pub const fn new() -> Self {
        Self { last_hour: None }
    }

    /// Feed the current time.  Returns `true` exactly once per hour change.
    pub fn observe(&mut self, now: &DateTime) -> bool {
        if now.hour > 23 {
            return false;
        }
        match self.last_hour.replace(now.hour) {
            Some(prev) => prev != now.hour,
            None => false,
        }
    }

    /// Forget the last hour, e.g. after the clock was set by hand.
    pub fn reset(&mut self) {
        self.last_hour = None;
    }

    pub fn last_hour(&self) -> Option<u8> {
        self.last_hour
    }
}
