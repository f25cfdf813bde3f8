//! Input drivers and peripheral helpers.

pub mod button;
pub mod watchdog;
