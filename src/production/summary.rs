//! Finished-session summaries.

use core::fmt::Write as _;

use crate::app::ports::StoragePort;
use crate::error::StorageError;
use crate::time::DateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub started: DateTime,
    pub stopped: DateTime,
    pub production_count: u32,
}

impl SessionSummary {
    /// `Production_YYYYMMDD_HHMMSS_to_HHMMSS.txt`
    pub fn file_name(&self) -> heapless::String<48> {
        let mut s = heapless::String::new();
        let _ = write!(
            s,
            "Production_{}_{}_to_{}.txt",
            self.started.date_stamp(),
            self.started.time_stamp(),
            self.stopped.time_stamp()
        );
        s
    }

    /// Per-day file collecting every session that ended that day.
    pub fn daily_file_name(&self) -> heapless::String<32> {
        let mut s = heapless::String::new();
        let _ = write!(s, "HourlyProduction_{}.txt", self.stopped.date_stamp());
        s
    }

    pub fn render(&self) -> heapless::String<160> {
        let mut s = heapless::String::new();
        let _ = write!(
            s,
            "=== PRODUCTION SESSION ===\nProduction Started: {}\nProduction Stopped: {}\nProduction Count: {}\n",
            self.started, self.stopped, self.production_count
        );
        s
    }

    /// Write the standalone summary and append to the day's file.
    pub fn persist(&self, storage: &mut impl StoragePort) -> Result<(), StorageError> {
        storage.write_text(&self.file_name(), &self.render())?;

        let daily = self.daily_file_name();
        storage.append_record(&daily, "---")?;
        let mut line: heapless::String<48> = heapless::String::new();
        let (a, b) = (&self.started, &self.stopped);
        let _ = write!(
            line,
            "Session: {:02}:{:02}:{:02} to {:02}:{:02}:{:02}",
            a.hour, a.minute, a.second, b.hour, b.minute, b.second
        );
        storage.append_record(&daily, &line)?;
        line.clear();
        let _ = write!(line, "Count: {}", self.production_count);
        storage.append_record(&daily, &line)
    }
}
