//! ProdCounter Firmware — Main Entry Point
//!
//! Hexagonal architecture with an ISR-fed event queue.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  FileStorage    SystemClock    LogDisplay    LatchSwitch       │
//! │  (StoragePort)  (TimePort)     (DisplayPort) (LatchPort)       │
//! │  LogEventSink (EventSink)      Serial console (AppCommand)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · Guards · Session · Hour ledger                  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  GPIO ISRs ──▶ Debouncer ──▶ EventQueue ──▶ main loop          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::BufRead;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::Result;
use esp_idf_hal::gpio::{AnyIOPin, Gpio13, Gpio18, Gpio19, Gpio23, Input, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::spi::config::DriverConfig;
use esp_idf_hal::spi::{SpiDriver, SPI2};
use esp_idf_svc::fs::fatfs::Fatfs;
use esp_idf_svc::io::vfs::MountedFatfs;
use esp_idf_svc::sd::spi::SdSpiHostDriver;
use esp_idf_svc::sd::{SdCardConfiguration, SdCardDriver};
use esp_idf_svc::sys::*;
use log::{error, info, warn};

use prodcounter::adapters::clock::SystemClock;
use prodcounter::adapters::display::LogDisplay;
use prodcounter::adapters::file_storage::{FileStorage, SD_MOUNT_POINT};
use prodcounter::adapters::log_sink::LogEventSink;
use prodcounter::app::commands::AppCommand;
use prodcounter::app::ports::{
    DisplayPort, HardwareFault, LatchPort, SelfTestPort, StorageError, StoragePort, TimePort,
};
use prodcounter::app::service::AppService;
use prodcounter::config::SystemConfig;
use prodcounter::diagnostics::{RuntimeMetrics, SelfTestReport};
use prodcounter::drivers::button::{Debouncer, LatchSwitch};
use prodcounter::drivers::watchdog::Watchdog;
use prodcounter::events::{Event, EventQueue};
use prodcounter::fsm::Mode;
use prodcounter::time::DateTime;

// ── GPIO assignment ───────────────────────────────────────────

const COUNTER_GPIO: i32 = 4;
const LATCH_GPIO: i32 = 5;
const DIAG_GPIO: i32 = 0;
// SD slot on SPI2: SCK 18, MOSI 23, MISO 19, CS 13.

/// Open files allowed on the SD volume at once.
const SD_MAX_FDS: usize = 4;

/// Main-loop period.  Well under the smallest debounce window.
const LOOP_PERIOD_MS: u64 = 10;

const CONFIG_FILE: &str = "config.json";
const SELF_TEST_FILE: &str = "selftest.txt";

// ── ISR side ──────────────────────────────────────────────────

static EVENTS: EventQueue = EventQueue::new();
static COUNTER_DEBOUNCE: Debouncer = Debouncer::new(50);
static LATCH_DEBOUNCE: Debouncer = Debouncer::new(100);
static DIAG_DEBOUNCE: Debouncer = Debouncer::new(250);

fn isr_now_ms() -> u32 {
    // SAFETY: esp_timer_get_time is ISR-safe.
    (unsafe { esp_timer_get_time() } / 1000) as u32
}

unsafe extern "C" fn counter_isr(_arg: *mut core::ffi::c_void) {
    if COUNTER_DEBOUNCE.accept(isr_now_ms()) {
        EVENTS.enqueue(Event::CounterPressed);
    }
}

unsafe extern "C" fn latch_isr(_arg: *mut core::ffi::c_void) {
    if LATCH_DEBOUNCE.accept(isr_now_ms()) {
        EVENTS.enqueue(Event::LatchToggled);
    }
}

unsafe extern "C" fn diag_isr(_arg: *mut core::ffi::c_void) {
    if DIAG_DEBOUNCE.accept(isr_now_ms()) {
        EVENTS.enqueue(Event::DiagnosticRequest);
    }
}

fn attach_isr(
    gpio: i32,
    edge: gpio_int_type_t,
    handler: unsafe extern "C" fn(*mut core::ffi::c_void),
) -> Result<()> {
    // SAFETY: the pin is configured as an input before this is called and
    // the handlers only touch lock-free / critical-section state.
    unsafe {
        esp!(gpio_set_intr_type(gpio, edge))?;
        esp!(gpio_isr_handler_add(gpio, Some(handler), core::ptr::null_mut()))?;
    }
    Ok(())
}

// ── Board: every port the core needs ──────────────────────────

struct Board<'d> {
    storage: FileStorage,
    clock: SystemClock,
    display: LogDisplay,
    latch: LatchSwitch<PinDriver<'d, AnyIOPin, Input>>,
}

impl StoragePort for Board<'_> {
    fn is_available(&self) -> bool {
        self.storage.is_available()
    }
    fn read_text(&self, name: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.storage.read_text(name, buf)
    }
    fn write_text(&mut self, name: &str, text: &str) -> Result<(), StorageError> {
        self.storage.write_text(name, text)
    }
    fn append_record(&mut self, name: &str, line: &str) -> Result<(), StorageError> {
        self.storage.append_record(name, line)
    }
    fn delete_file(&mut self, name: &str) -> Result<(), StorageError> {
        self.storage.delete_file(name)
    }
    fn exists(&self, name: &str) -> bool {
        self.storage.exists(name)
    }
}

impl TimePort for Board<'_> {
    fn now(&self) -> Option<DateTime> {
        self.clock.now()
    }
    fn hour_boundary_occurred(&mut self) -> bool {
        self.clock.hour_boundary_occurred()
    }
    fn set_time(&mut self, dt: DateTime) -> Result<(), HardwareFault> {
        self.clock.set_time(dt)
    }
}

impl DisplayPort for Board<'_> {
    fn notify(&mut self, mode: Mode, count: u32) {
        self.display.notify(mode, count);
    }
}

impl LatchPort for Board<'_> {
    fn latch_engaged(&mut self) -> bool {
        self.latch.latch_engaged()
    }
}

impl SelfTestPort for Board<'_> {
    fn run_self_test(&mut self) -> SelfTestReport {
        let storage_ok = self.storage.is_available()
            && self.storage.write_int(SELF_TEST_FILE, 1234).is_ok()
            && self.storage.read_int(SELF_TEST_FILE) == Ok(1234)
            && self.storage.delete_file(SELF_TEST_FILE).is_ok();
        SelfTestReport {
            rtc_ok: self.clock.now().is_some(),
            storage_ok,
            // The status display is the serial console; it is always present.
            display_ok: true,
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// Mount the SD card's FAT volume at [`SD_MOUNT_POINT`].  The returned
/// handle unmounts on drop.
fn mount_sd_card(
    spi: SPI2,
    sck: Gpio18,
    mosi: Gpio23,
    miso: Gpio19,
    cs: Gpio13,
) -> Result<impl Sized> {
    let bus = SpiDriver::new(spi, sck, mosi, Some(miso), &DriverConfig::default())?;
    let host = SdSpiHostDriver::new(
        bus,
        Some(cs),
        AnyIOPin::none(),
        AnyIOPin::none(),
        AnyIOPin::none(),
        #[cfg(not(any(
            esp_idf_version_major = "4",
            all(esp_idf_version_major = "5", esp_idf_version_minor = "0"),
            all(esp_idf_version_major = "5", esp_idf_version_minor = "1"),
        )))]
        None,
    )?;
    let card = SdCardDriver::new_spi(host, &SdCardConfiguration::new())?;
    let fatfs = Fatfs::new_sdcard(0, card)?;
    let mounted = MountedFatfs::mount(fatfs, SD_MOUNT_POINT, SD_MAX_FDS)?;
    info!("SD card mounted at {}", SD_MOUNT_POINT);
    Ok(mounted)
}

fn load_config(storage: &FileStorage) -> SystemConfig {
    let mut buf = [0u8; 1024];
    let cfg = storage
        .read_text(CONFIG_FILE, &mut buf)
        .ok()
        .and_then(|n| serde_json::from_slice::<SystemConfig>(&buf[..n]).ok());
    match cfg {
        Some(cfg) if cfg.validate().is_ok() => {
            info!("Config loaded from {}", CONFIG_FILE);
            cfg
        }
        Some(_) => {
            warn!("{} failed validation, using defaults", CONFIG_FILE);
            SystemConfig::default()
        }
        None => SystemConfig::default(),
    }
}

/// Serial console reader.  Lines are parsed here and handed to the main
/// loop, which never blocks on the UART.
fn spawn_console() -> Result<mpsc::Receiver<AppCommand>> {
    let (tx, rx) = mpsc::sync_channel(4);
    std::thread::Builder::new()
        .name("console".into())
        .stack_size(4096)
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { continue };
                match AppCommand::parse(&line) {
                    Some(cmd) => {
                        EVENTS.enqueue(Event::SerialCommand);
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    None => warn!("Console: unrecognised '{}'", line.trim()),
                }
            }
        })?;
    Ok(rx)
}

fn availability(ok: bool, up: Event, down: Event) -> Event {
    if ok { up } else { down }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  ProdCounter v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");
    EVENTS.enqueue(Event::StartupBegin);

    let peripherals = Peripherals::take()?;

    // ── 2. Storage + config ───────────────────────────────────
    // Without a card the service runs with storage unavailable: counting
    // continues, nothing persists, and the guards see the fault.
    let _sd_volume = match mount_sd_card(
        peripherals.spi2,
        peripherals.pins.gpio18,
        peripherals.pins.gpio23,
        peripherals.pins.gpio19,
        peripherals.pins.gpio13,
    ) {
        Ok(volume) => Some(volume),
        Err(e) => {
            error!("SD card mount failed: {e}");
            None
        }
    };
    let storage = FileStorage::new(SD_MOUNT_POINT);
    let config = load_config(&storage);
    COUNTER_DEBOUNCE.set_window_ms(config.debounce_ms);
    LATCH_DEBOUNCE.set_window_ms(config.latch_debounce_ms);

    // ── 3. Inputs + ISRs ──────────────────────────────────────
    let mut counter_pin = PinDriver::input(AnyIOPin::from(peripherals.pins.gpio4))?;
    counter_pin.set_pull(esp_idf_hal::gpio::Pull::Up)?;
    let mut latch_pin = PinDriver::input(AnyIOPin::from(peripherals.pins.gpio5))?;
    latch_pin.set_pull(esp_idf_hal::gpio::Pull::Up)?;
    let mut diag_pin = PinDriver::input(AnyIOPin::from(peripherals.pins.gpio0))?;
    diag_pin.set_pull(esp_idf_hal::gpio::Pull::Up)?;

    // SAFETY: installing the shared ISR service is idempotent.
    let ret = unsafe { gpio_install_isr_service(0) };
    if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE as esp_err_t {
        error!("ISR service install failed ({}), inputs disabled", ret);
    } else {
        attach_isr(COUNTER_GPIO, gpio_int_type_t_GPIO_INTR_NEGEDGE, counter_isr)?;
        attach_isr(LATCH_GPIO, gpio_int_type_t_GPIO_INTR_ANYEDGE, latch_isr)?;
        attach_isr(DIAG_GPIO, gpio_int_type_t_GPIO_INTR_NEGEDGE, diag_isr)?;
    }

    let mut watchdog = Watchdog::new(config.watchdog_timeout_ms);

    // ── 4. Adapters ───────────────────────────────────────────
    let mut hw = Board {
        storage,
        clock: SystemClock::new(),
        display: LogDisplay::new(config.status_display_ms),
        latch: LatchSwitch::new(latch_pin),
    };
    let mut log_sink = LogEventSink::new();
    let console = spawn_console()?;

    // ── 5. App service ────────────────────────────────────────
    let mut app = AppService::new(config.clone());

    let mut sd_ok = hw.storage.is_available();
    let mut rtc_ok = hw.clock.now().is_some();
    let mut health = *app.health();
    health.storage_available = sd_ok;
    health.clock_valid = rtc_ok;
    health.display_ready = true;
    health.heap_free_bytes = RuntimeMetrics::collect(0).heap_free;
    app.set_health(health);

    app.boot(&mut hw, &mut log_sink);

    // Latch already closed at power-up: no edge will ever fire for it.
    if hw.latch_engaged() && app.mode() == Mode::Ready {
        EVENTS.enqueue(Event::LatchToggled);
    }

    info!("System ready. Entering event loop.");

    // ── 6. Event loop ─────────────────────────────────────────
    loop {
        let now_ms = hw.clock.uptime_ms();

        // Hardware health drives the guards through ordinary events.
        let sd_now = hw.storage.is_available();
        if sd_now != sd_ok {
            sd_ok = sd_now;
            EVENTS.enqueue(availability(sd_ok, Event::SdAvailable, Event::SdUnavailable));
        }
        let rtc_now = hw.clock.now().is_some();
        if rtc_now != rtc_ok {
            rtc_ok = rtc_now;
            EVENTS.enqueue(availability(rtc_ok, Event::RtcAvailable, Event::RtcUnavailable));
        }
        app.set_heap_free(RuntimeMetrics::collect(hw.clock.uptime_secs()).heap_free);

        app.drain(&EVENTS, &mut hw, &mut log_sink);

        while let Ok(cmd) = console.try_recv() {
            if let Err(e) = app.handle_command(cmd, &mut hw, &mut log_sink) {
                warn!("Console: command failed: {}", e);
            }
            hw.display.set_refresh_ms(app.current_config().status_display_ms);
        }

        app.poll(now_ms, &mut hw, &mut log_sink);
        hw.display.tick();

        watchdog.feed(now_ms);
        std::thread::sleep(Duration::from_millis(LOOP_PERIOD_MS));
    }
}
