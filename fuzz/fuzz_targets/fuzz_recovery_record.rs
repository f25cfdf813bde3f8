//! Fuzz target: recovery record parser
//!
//! The record is the only file the firmware trusts across a reset, and a
//! power cut can leave it half-written.  Drives `RecoveryRecord::parse`
//! with arbitrary bytes and verifies:
//! - No panics under arbitrary input
//! - Anything accepted is valid and within `max_count`
//! - Accepted records re-encode to text that parses to the same record
//!
//! cargo fuzz run fuzz_recovery_record

#![no_main]

use libfuzzer_sys::fuzz_target;
use prodcounter::production::RecoveryRecord;

const MAX_COUNT: u32 = 9_999;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    if let Ok(record) = RecoveryRecord::parse(text, MAX_COUNT) {
        assert!(record.is_valid());
        assert!(record.current_count <= MAX_COUNT);
        assert!(record.production_count() <= record.current_count);

        let again = RecoveryRecord::parse(&record.encode(), MAX_COUNT);
        assert_eq!(again, Ok(record));
    }
});
