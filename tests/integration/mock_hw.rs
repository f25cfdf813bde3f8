//! Mock hardware adapter for integration tests.
//!
//! Backs every port with in-memory state so tests can script the clock,
//! the latch and the self-test outcome, and assert on the files written
//! and the display history without touching real peripherals.

use std::collections::HashMap;

use prodcounter::app::events::AppEvent;
use prodcounter::app::ports::{
    DisplayPort, EventSink, HardwareFault, LatchPort, SelfTestPort, StorageError, StoragePort,
    TimePort,
};
use prodcounter::diagnostics::SelfTestReport;
use prodcounter::fsm::Mode;
use prodcounter::time::DateTime;

pub const T0: DateTime = DateTime::new(2025, 11, 12, 8, 15, 0);

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub files: HashMap<String, String>,
    pub storage_online: bool,
    pub now: Option<DateTime>,
    /// Reported by the next `hour_boundary_occurred` call, then cleared.
    pub pending_boundary: bool,
    pub latch: bool,
    pub self_test: SelfTestReport,
    pub displayed: Vec<(Mode, u32)>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            storage_online: true,
            now: Some(T0),
            pending_boundary: false,
            latch: false,
            self_test: SelfTestReport::all_passed(),
            displayed: Vec::new(),
        }
    }

    /// Advance the clock to `hour` and arm a boundary for the next poll.
    pub fn cross_hour(&mut self, hour: u8) {
        let mut now = self.now.unwrap_or(T0);
        now.hour = hour;
        now.minute = 0;
        now.second = 0;
        self.now = Some(now);
        self.pending_boundary = true;
    }

    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    pub fn put(&mut self, name: &str, text: &str) {
        self.files.insert(name.to_owned(), text.to_owned());
    }

    pub fn file_names_starting(&self, prefix: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .files
            .keys()
            .map(String::as_str)
            .filter(|n| n.starts_with(prefix))
            .collect();
        names.sort_unstable();
        names
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl StoragePort for MockHardware {
    fn is_available(&self) -> bool {
        self.storage_online
    }

    fn read_text(&self, name: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        if !self.storage_online {
            return Err(StorageError::Unavailable);
        }
        let f = self.files.get(name).ok_or(StorageError::NotFound)?;
        let n = f.len().min(buf.len());
        buf[..n].copy_from_slice(&f.as_bytes()[..n]);
        Ok(n)
    }

    fn write_text(&mut self, name: &str, text: &str) -> Result<(), StorageError> {
        if !self.storage_online {
            return Err(StorageError::Unavailable);
        }
        self.put(name, text);
        Ok(())
    }

    fn append_record(&mut self, name: &str, line: &str) -> Result<(), StorageError> {
        if !self.storage_online {
            return Err(StorageError::Unavailable);
        }
        let f = self.files.entry(name.to_owned()).or_default();
        f.push_str(line);
        f.push('\n');
        Ok(())
    }

    fn delete_file(&mut self, name: &str) -> Result<(), StorageError> {
        if !self.storage_online {
            return Err(StorageError::Unavailable);
        }
        self.files.remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.storage_online && self.files.contains_key(name)
    }
}

impl TimePort for MockHardware {
    fn now(&self) -> Option<DateTime> {
        self.now
    }

    fn hour_boundary_occurred(&mut self) -> bool {
        core::mem::take(&mut self.pending_boundary)
    }

    fn set_time(&mut self, dt: DateTime) -> Result<(), HardwareFault> {
        self.now = Some(dt);
        self.pending_boundary = false;
        Ok(())
    }
}

impl DisplayPort for MockHardware {
    fn notify(&mut self, mode: Mode, count: u32) {
        self.displayed.push((mode, count));
    }
}

impl SelfTestPort for MockHardware {
    fn run_self_test(&mut self) -> SelfTestReport {
        self.self_test
    }
}

impl LatchPort for MockHardware {
    fn latch_engaged(&mut self) -> bool {
        self.latch
    }
}

// ── Recording event sink ──────────────────────────────────────

#[derive(Default)]
pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }

    pub fn count_matching(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
