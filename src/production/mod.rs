//! Production domain: the counting session, its crash-recovery record,
//! finished-session summaries and the hourly ledger.
//!
//! Everything here is plain data plus storage calls through
//! [`StoragePort`](crate::app::ports::StoragePort); mode decisions live in
//! [`crate::fsm`] and orchestration in [`crate::app::service`].

pub mod ledger;
pub mod recovery;
pub mod session;
pub mod summary;

pub use ledger::{HourAccountant, HourEntry, HourLedger};
pub use recovery::RecoveryRecord;
pub use session::ProductionSession;
pub use summary::SessionSummary;
