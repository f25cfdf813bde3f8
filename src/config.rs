//! System configuration parameters
//!
//! All tunable parameters for the production counter.
//! Values can be replaced at runtime through [`AppCommand::UpdateConfig`](crate::app::commands::AppCommand::UpdateConfig),
//! which validates before applying.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Persistence ---
    /// Interval between periodic count saves (milliseconds)
    pub save_interval_ms: u32,

    // --- Inputs ---
    /// Counter button debounce window (milliseconds)
    pub debounce_ms: u32,
    /// Latch switch debounce window (milliseconds)
    pub latch_debounce_ms: u32,

    // --- Counting ---
    /// Saturation ceiling for the running count
    pub max_count: u32,

    // --- Display ---
    /// How long transient status messages stay on screen (milliseconds)
    pub status_display_ms: u32,

    // --- Health ---
    /// Free heap below which production may not start (bytes)
    pub min_free_heap_bytes: u32,

    // --- Mode timeouts ---
    /// Initialization longer than this goes to Error (milliseconds)
    pub init_timeout_ms: u32,
    /// Diagnostic longer than this returns to Ready (milliseconds)
    pub diagnostic_timeout_ms: u32,
    /// Error mode attempts recovery after this long (milliseconds)
    pub error_recovery_ms: u32,

    // --- Watchdog ---
    /// Main loop must feed the watchdog within this window (milliseconds)
    pub watchdog_timeout_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            save_interval_ms: 5_000,

            debounce_ms: 50,
            latch_debounce_ms: 100,

            max_count: 9_999,

            status_display_ms: 3_000,

            min_free_heap_bytes: 50_000,

            init_timeout_ms: 30_000,
            diagnostic_timeout_ms: 60_000,
            error_recovery_ms: 5_000,

            watchdog_timeout_ms: 10_000,
        }
    }
}

impl SystemConfig {
    /// Range-check every user-tunable field.  Out-of-range values are
    /// rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1_000..=60_000).contains(&self.save_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "save_interval_ms must be 1000..=60000",
            ));
        }
        if !(10..=500).contains(&self.debounce_ms) {
            return Err(ConfigError::ValidationFailed("debounce_ms must be 10..=500"));
        }
        if !(10..=1_000).contains(&self.latch_debounce_ms) {
            return Err(ConfigError::ValidationFailed(
                "latch_debounce_ms must be 10..=1000",
            ));
        }
        if !(100..=99_999).contains(&self.max_count) {
            return Err(ConfigError::ValidationFailed("max_count must be 100..=99999"));
        }
        if !(1_000..=10_000).contains(&self.status_display_ms) {
            return Err(ConfigError::ValidationFailed(
                "status_display_ms must be 1000..=10000",
            ));
        }
        if self.init_timeout_ms == 0 || self.diagnostic_timeout_ms == 0 || self.error_recovery_ms == 0 {
            return Err(ConfigError::ValidationFailed("mode timeouts must be non-zero"));
        }
        if self.watchdog_timeout_ms < 1_000 {
            return Err(ConfigError::ValidationFailed(
                "watchdog_timeout_ms must be at least 1000",
            ));
        }
        Ok(())
    }

    /// Compact JSON for the boot banner.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
