//! Hour-boundary accounting through the full service.

use crate::mock_hw::{LogSink, MockHardware};

use prodcounter::app::events::AppEvent;
use prodcounter::app::service::AppService;
use prodcounter::config::SystemConfig;
use prodcounter::events::Event;
use prodcounter::fsm::Mode;
use prodcounter::fsm::guards::GuardContext;
use prodcounter::production::HourEntry;
use prodcounter::production::ledger::{BOUNDARY_FILE, COUNT_FILE, CUMULATIVE_FILE, HOURLY_FILE};
use prodcounter::production::recovery::RECOVERY_FILE;
use prodcounter::time::DateTime;

fn boot(hw: &mut MockHardware) -> (AppService, LogSink) {
    let mut app = AppService::new(SystemConfig::default());
    app.set_health(GuardContext::healthy());
    let mut sink = LogSink::new();
    app.boot(hw, &mut sink);
    (app, sink)
}

fn hour_entries(sink: &LogSink) -> Vec<HourEntry> {
    sink.events
        .iter()
        .filter_map(|e| match e {
            AppEvent::HourLogged(entry) => Some(*entry),
            _ => None,
        })
        .collect()
}

#[test]
fn idle_rollover_logs_and_zeroes_count() {
    let mut hw = MockHardware::new();
    hw.put(COUNT_FILE, "150\n");
    let (mut app, mut sink) = boot(&mut hw);
    assert_eq!(app.session().current_count(), 150);

    hw.cross_hour(9);
    app.poll(100, &mut hw, &mut sink);

    assert_eq!(app.ledger().hourly_count, 150);
    assert_eq!(app.ledger().cumulative_count, 150);
    assert_eq!(app.session().current_count(), 0);

    assert_eq!(hw.file(COUNT_FILE), Some("0\n"));
    assert_eq!(hw.file(HOURLY_FILE), Some("150\n"));
    assert_eq!(hw.file(CUMULATIVE_FILE), Some("150\n"));
    assert_eq!(hw.file(BOUNDARY_FILE), Some("0\n"));
    assert_eq!(
        hw.file("HourLog_20251112.txt"),
        Some("2025-11-12 09:00:00,150,150\n")
    );
    assert_eq!(
        hour_entries(&sink),
        vec![HourEntry {
            at: DateTime::new(2025, 11, 12, 9, 0, 0),
            delta: 150,
            cumulative: 150,
        }]
    );
}

#[test]
fn rollover_during_production_preserves_count() {
    let mut hw = MockHardware::new();
    hw.put(COUNT_FILE, "120\n");
    hw.put(BOUNDARY_FILE, "120\n");
    hw.put(CUMULATIVE_FILE, "1000\n");
    let (mut app, mut sink) = boot(&mut hw);

    hw.latch = true;
    app.handle_event(Event::LatchToggled, &mut hw, &mut sink);
    for _ in 0..30 {
        app.handle_event(Event::CounterPressed, &mut hw, &mut sink);
    }

    hw.cross_hour(9);
    app.poll(100, &mut hw, &mut sink);

    assert!(app.session().is_active());
    assert_eq!(app.session().current_count(), 150);
    assert_eq!(app.session().production_count(), 30);
    assert_eq!(app.ledger().hourly_count, 30);
    assert_eq!(app.ledger().cumulative_count, 1030);
    assert_eq!(app.ledger().last_boundary_baseline, 150);
    assert_eq!(hw.file(BOUNDARY_FILE), Some("150\n"));
}

#[test]
fn units_are_counted_once_across_boundaries() {
    let mut hw = MockHardware::new();
    let (mut app, mut sink) = boot(&mut hw);

    hw.latch = true;
    app.handle_event(Event::LatchToggled, &mut hw, &mut sink);
    for _ in 0..10 {
        app.handle_event(Event::CounterPressed, &mut hw, &mut sink);
    }
    hw.cross_hour(9);
    app.poll(100, &mut hw, &mut sink);

    for _ in 0..5 {
        app.handle_event(Event::CounterPressed, &mut hw, &mut sink);
    }
    hw.latch = false;
    app.handle_event(Event::LatchToggled, &mut hw, &mut sink);

    hw.cross_hour(10);
    app.poll(200, &mut hw, &mut sink);

    let deltas: Vec<u32> = hour_entries(&sink).iter().map(|e| e.delta).collect();
    assert_eq!(deltas, vec![10, 5]);
    assert_eq!(app.ledger().cumulative_count, 15);
    assert_eq!(app.session().current_count(), 0);
    assert_eq!(
        hw.file("HourLog_20251112.txt"),
        Some("2025-11-12 09:00:00,10,10\n2025-11-12 10:00:00,5,15\n")
    );
}

#[test]
fn no_accounting_without_valid_clock() {
    let mut hw = MockHardware::new();
    hw.put(COUNT_FILE, "25\n");
    let (mut app, mut sink) = boot(&mut hw);

    hw.cross_hour(9);
    hw.now = None;
    app.poll(100, &mut hw, &mut sink);

    assert!(hour_entries(&sink).is_empty());
    assert_eq!(app.session().current_count(), 25);
    assert!(hw.pending_boundary, "boundary not consumed while clock invalid");
}

#[test]
fn ledger_restored_at_boot() {
    let mut hw = MockHardware::new();
    hw.put(COUNT_FILE, "40\n");
    hw.put(HOURLY_FILE, "12\n");
    hw.put(CUMULATIVE_FILE, "900\n");
    hw.put(BOUNDARY_FILE, "55\n");

    let (app, _sink) = boot(&mut hw);

    assert_eq!(app.ledger().hourly_count, 12);
    assert_eq!(app.ledger().cumulative_count, 900);
    assert_eq!(app.ledger().last_boundary_baseline, 0, "baseline above count dropped");
}

#[test]
fn rollover_during_production_checkpoints_session() {
    let mut hw = MockHardware::new();
    {
        let (mut app, mut sink) = boot(&mut hw);
        hw.latch = true;
        app.handle_event(Event::LatchToggled, &mut hw, &mut sink);
        for _ in 0..3 {
            app.handle_event(Event::CounterPressed, &mut hw, &mut sink);
        }

        hw.cross_hour(9);
        app.poll(1_000, &mut hw, &mut sink);
        app.poll(20_000, &mut hw, &mut sink);
        app.poll(40_000, &mut hw, &mut sink);

        assert!(!app.is_count_dirty());
        assert_eq!(hw.file(COUNT_FILE), Some("3\n"));
        assert_eq!(
            hw.file(RECOVERY_FILE),
            Some("3\n0\n2025\n11\n12\n8\n15\n0\n"),
            "record carries the presses counted before the boundary"
        );
        // Power lost here.
    }

    let (app, _sink) = boot(&mut hw);
    assert_eq!(app.mode(), Mode::Production);
    assert_eq!(app.session().current_count(), 3);
    assert_eq!(app.session().production_count(), 3);
    assert_eq!(app.ledger().last_boundary_baseline, 3);
}

#[test]
fn boundary_baseline_checked_against_recovered_count() {
    let mut hw = MockHardware::new();
    // count.txt got ahead of the record before the reset.
    hw.put(COUNT_FILE, "40\n");
    hw.put(BOUNDARY_FILE, "30\n");
    hw.put(CUMULATIVE_FILE, "500\n");
    hw.put(RECOVERY_FILE, "20\n5\n2025\n11\n12\n8\n0\n0\n");

    let (mut app, mut sink) = boot(&mut hw);
    assert!(app.session().is_active());
    assert_eq!(app.session().current_count(), 20);
    assert_eq!(app.ledger().last_boundary_baseline, 0);

    for _ in 0..4 {
        app.handle_event(Event::CounterPressed, &mut hw, &mut sink);
    }
    hw.cross_hour(9);
    app.poll(100, &mut hw, &mut sink);

    assert_eq!(hour_entries(&sink).last().map(|e| e.delta), Some(24));
    assert_eq!(app.ledger().cumulative_count, 524);
}
