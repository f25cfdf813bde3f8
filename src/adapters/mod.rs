//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements   | Connects to                      |
//! |----------------|--------------|----------------------------------|
//! | `clock`        | TimePort     | System clock (RTC-backed on ESP) |
//! | `display`      | DisplayPort  | Serial status line               |
//! | `file_storage` | StoragePort  | FAT volume on the SD card        |
//! | `log_sink`     | EventSink    | Serial log output                |

pub mod clock;
pub mod display;
pub mod file_storage;
pub mod log_sink;
