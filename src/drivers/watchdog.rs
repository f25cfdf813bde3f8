//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the main loop
//! stalls for longer than `watchdog_timeout_ms`.  On the host the
//! hardware part is a no-op; the software stall check still works, so
//! tests can exercise it.
//!
//! The main loop must call `feed()` on every iteration.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

pub struct Watchdog {
    timeout_ms: u32,
    last_feed_ms: u64,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before the loop starts.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!(
                        "TWDT reconfigure returned {} (may already be configured)",
                        ret
                    );
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed ({}ms timeout, panic on trigger)", timeout_ms);
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self {
                    timeout_ms,
                    last_feed_ms: 0,
                    subscribed,
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): {}ms timeout, no hardware reset", timeout_ms);
            Self {
                timeout_ms,
                last_feed_ms: 0,
            }
        }
    }

    /// Feed the watchdog.  Must be called at least once per timeout.
    pub fn feed(&mut self, now_ms: u64) {
        self.last_feed_ms = now_ms;

        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: the current task subscribed in `new`.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }

    /// Whether the loop has gone a full timeout without feeding.
    pub fn is_starved(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_feed_ms) >= u64::from(self.timeout_ms)
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }
}
