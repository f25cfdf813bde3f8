//! Self-test results and runtime health metrics.
//!
//! The self-test routines themselves live behind
//! [`SelfTestPort`](crate::app::ports::SelfTestPort); this module only
//! defines what a run reports.  [`RuntimeMetrics`] feeds the heap figure
//! into the guard context each loop iteration.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of one self-test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelfTestReport {
    pub rtc_ok: bool,
    pub storage_ok: bool,
    pub display_ok: bool,
}

impl SelfTestReport {
    pub const fn all_passed() -> Self {
        Self {
            rtc_ok: true,
            storage_ok: true,
            display_ok: true,
        }
    }

    pub fn passed(&self) -> bool {
        self.rtc_ok && self.storage_ok && self.display_ok
    }
}

impl fmt::Display for SelfTestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |ok: bool| if ok { "PASS" } else { "FAIL" };
        write!(
            f,
            "rtc={} sd={} display={}",
            mark(self.rtc_ok),
            mark(self.storage_ok),
            mark(self.display_ok)
        )
    }
}

/// Runtime diagnostics snapshot collected on-demand.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeMetrics {
    pub uptime_secs: u64,
    pub heap_free: u32,
    pub heap_min_free: u32,
}

impl RuntimeMetrics {
    #[cfg(target_os = "espidf")]
    pub fn collect(uptime_secs: u64) -> Self {
        use esp_idf_svc::sys::{esp_get_free_heap_size, esp_get_minimum_free_heap_size};
        // SAFETY: plain getters with no preconditions.
        let heap_free = unsafe { esp_get_free_heap_size() };
        let heap_min_free = unsafe { esp_get_minimum_free_heap_size() };
        Self {
            uptime_secs,
            heap_free,
            heap_min_free,
        }
    }

    /// Host builds have no ESP heap; report a fixed, healthy figure.
    #[cfg(not(target_os = "espidf"))]
    pub fn collect(uptime_secs: u64) -> Self {
        Self {
            uptime_secs,
            heap_free: HOST_HEAP_FREE,
            heap_min_free: HOST_HEAP_FREE,
        }
    }
}

#[cfg(not(target_os = "espidf"))]
const HOST_HEAP_FREE: u32 = 256 * 1024;
