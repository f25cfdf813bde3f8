//! System clock adapter.
//!
//! Implements [`TimePort`] on top of the process wall clock:
//!
//! - **`target_os = "espidf"`**: newlib's `gettimeofday`, which the
//!   ESP-IDF keeps running from the RTC across light sleep.
//! - **host**: the OS clock.
//!
//! Setting the time does not touch the OS clock; it records an offset
//! from it.  The clock is reported invalid until it reads a year in
//! `MIN_YEAR..=MAX_YEAR`, which is how an unsynced RTC (1970) shows up.

use std::time::Instant;

use jiff::tz::TimeZone;
use jiff::{SignedDuration, Timestamp};
use log::{info, warn};

use crate::app::ports::{HardwareFault, TimePort};
use crate::time::{DateTime, HourTracker};

pub struct SystemClock {
    offset: SignedDuration,
    boot: Instant,
    hours: HourTracker,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        let clock = Self {
            offset: SignedDuration::ZERO,
            boot: Instant::now(),
            hours: HourTracker::new(),
        };
        match clock.now() {
            Some(dt) => info!("SystemClock: {dt}"),
            None => warn!("SystemClock: wall clock not set"),
        }
        clock
    }

    /// Milliseconds since the adapter was created (monotonic).
    pub fn uptime_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }

    pub fn uptime_secs(&self) -> u64 {
        self.boot.elapsed().as_secs()
    }

    fn civil_now(&self) -> Option<jiff::civil::DateTime> {
        let ts = Timestamp::now().checked_add(self.offset).ok()?;
        Some(ts.to_zoned(TimeZone::UTC).datetime())
    }
}

fn from_civil(c: jiff::civil::DateTime) -> Option<DateTime> {
    let dt = DateTime::new(
        u16::try_from(c.year()).ok()?,
        c.month() as u8,
        c.day() as u8,
        c.hour() as u8,
        c.minute() as u8,
        c.second() as u8,
    );
    dt.is_valid().then_some(dt)
}

fn to_civil(dt: DateTime) -> Result<jiff::civil::DateTime, HardwareFault> {
    jiff::civil::DateTime::new(
        dt.year as i16,
        dt.month as i8,
        dt.day as i8,
        dt.hour as i8,
        dt.minute as i8,
        dt.second as i8,
        0,
    )
    .map_err(|_| HardwareFault::ClockInvalid)
}

impl TimePort for SystemClock {
    fn now(&self) -> Option<DateTime> {
        self.civil_now().and_then(from_civil)
    }

    fn hour_boundary_occurred(&mut self) -> bool {
        match self.now() {
            Some(now) => self.hours.observe(&now),
            None => false,
        }
    }

    fn set_time(&mut self, dt: DateTime) -> Result<(), HardwareFault> {
        if !dt.is_valid() {
            return Err(HardwareFault::ClockInvalid);
        }
        let target = to_civil(dt)?
            .to_zoned(TimeZone::UTC)
            .map_err(|_| HardwareFault::ClockInvalid)?
            .timestamp();
        self.offset = target.duration_since(Timestamp::now());
        // A manual adjustment is not an hour boundary.
        self.hours.reset();
        info!("SystemClock: set to {dt} (offset {}s)", self.offset.as_secs());
        Ok(())
    }
}
