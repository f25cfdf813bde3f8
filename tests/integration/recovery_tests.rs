//! Session recovery across resets.
//!
//! A reset is simulated by dropping the `AppService` and booting a fresh
//! one against the same mock board, so only what reached storage survives.

use crate::mock_hw::{LogSink, MockHardware};

use prodcounter::app::events::AppEvent;
use prodcounter::app::service::AppService;
use prodcounter::config::SystemConfig;
use prodcounter::error::{Rejection, TransitionError};
use prodcounter::events::Event;
use prodcounter::fsm::Mode;
use prodcounter::fsm::guards::GuardContext;
use prodcounter::production::recovery::RECOVERY_FILE;
use prodcounter::time::DateTime;

fn boot_with(hw: &mut MockHardware, health: GuardContext) -> (AppService, LogSink) {
    let mut app = AppService::new(SystemConfig::default());
    app.set_health(health);
    let mut sink = LogSink::new();
    app.boot(hw, &mut sink);
    (app, sink)
}

fn boot(hw: &mut MockHardware) -> (AppService, LogSink) {
    boot_with(hw, GuardContext::healthy())
}

#[test]
fn valid_record_resumes_production() {
    let mut hw = MockHardware::new();
    hw.put(RECOVERY_FILE, "42\n10\n2025\n11\n12\n7\n30\n0\n");

    let (app, sink) = boot(&mut hw);

    assert!(app.session().is_active());
    assert_eq!(app.session().current_count(), 42);
    assert_eq!(app.session().baseline_count(), 10);
    assert_eq!(app.session().production_count(), 32);
    assert_eq!(app.session().started(), Some(DateTime::new(2025, 11, 12, 7, 30, 0)));
    assert_eq!(app.mode(), Mode::Production);
    assert!(sink.contains(&AppEvent::SessionRecovered { production_count: 32 }));
}

#[test]
fn out_of_range_month_is_discarded() {
    let mut hw = MockHardware::new();
    hw.put(RECOVERY_FILE, "42\n10\n2025\n14\n12\n7\n30\n0\n");

    let (app, sink) = boot(&mut hw);

    assert!(!app.session().is_active());
    assert_eq!(app.mode(), Mode::Ready);
    assert!(hw.file(RECOVERY_FILE).is_none(), "corrupt record deleted");
    assert_eq!(
        sink.count_matching(|e| matches!(e, AppEvent::SessionRecovered { .. })),
        0
    );
}

#[test]
fn truncated_record_is_discarded() {
    let mut hw = MockHardware::new();
    hw.put(RECOVERY_FILE, "42\n10\n20");

    let (app, _sink) = boot(&mut hw);

    assert!(!app.session().is_active());
    assert!(hw.file(RECOVERY_FILE).is_none());
}

#[test]
fn stopped_session_is_not_recovered() {
    let mut hw = MockHardware::new();
    {
        let (mut app, mut sink) = boot(&mut hw);
        hw.latch = true;
        app.handle_event(Event::LatchToggled, &mut hw, &mut sink);
        app.handle_event(Event::CounterPressed, &mut hw, &mut sink);
        hw.latch = false;
        app.handle_event(Event::LatchToggled, &mut hw, &mut sink);
    }
    assert!(hw.file(RECOVERY_FILE).is_none());

    hw.latch = false;
    let (app, _sink) = boot(&mut hw);
    assert!(!app.session().is_active());
    assert_eq!(app.mode(), Mode::Ready);
    assert_eq!(app.session().current_count(), 1, "running count restored");
}

#[test]
fn checkpointed_session_survives_reset() {
    let mut hw = MockHardware::new();
    {
        let (mut app, mut sink) = boot(&mut hw);
        hw.latch = true;
        app.handle_event(Event::LatchToggled, &mut hw, &mut sink);
        for _ in 0..4 {
            app.handle_event(Event::CounterPressed, &mut hw, &mut sink);
        }
        app.poll(5_000, &mut hw, &mut sink);
        // Power lost here: no stop, no flush.
    }

    let (app, _sink) = boot(&mut hw);
    assert!(app.session().is_active());
    assert_eq!(app.session().production_count(), 4);
    assert_eq!(app.mode(), Mode::Production);
}

#[test]
fn resume_refused_closes_recovered_session() {
    let mut hw = MockHardware::new();
    hw.put(RECOVERY_FILE, "42\n10\n2025\n11\n12\n7\n30\n0\n");
    let degraded = GuardContext {
        display_ready: false,
        ..GuardContext::healthy()
    };

    let (app, sink) = boot_with(&mut hw, degraded);

    assert_eq!(app.mode(), Mode::Ready);
    assert!(!app.session().is_active());
    assert!(sink.contains(&AppEvent::TransitionRejected(TransitionError {
        from: Mode::Ready,
        to: Mode::Production,
        reason: Rejection::GuardFailed,
    })));
    let stopped = sink.events.iter().find_map(|e| match e {
        AppEvent::SessionStopped(s) => Some(*s),
        _ => None,
    });
    assert_eq!(stopped.map(|s| s.production_count), Some(32));
    assert!(hw.file(RECOVERY_FILE).is_none());
}

#[test]
fn storage_offline_at_boot_keeps_record_for_later() {
    let mut hw = MockHardware::new();
    hw.put(RECOVERY_FILE, "42\n10\n2025\n11\n12\n7\n30\n0\n");
    hw.storage_online = false;
    let no_sd = GuardContext {
        storage_available: false,
        ..GuardContext::healthy()
    };

    let (app, _sink) = boot_with(&mut hw, no_sd);

    assert!(!app.session().is_active());
    assert_eq!(app.mode(), Mode::Ready);
    assert!(hw.files.contains_key(RECOVERY_FILE), "record untouched");
}

#[test]
fn record_deleted_once_storage_returns_after_stop() {
    let mut hw = MockHardware::new();
    {
        let (mut app, mut sink) = boot(&mut hw);
        hw.latch = true;
        app.handle_event(Event::LatchToggled, &mut hw, &mut sink);
        app.handle_event(Event::CounterPressed, &mut hw, &mut sink);
        app.handle_event(Event::CounterPressed, &mut hw, &mut sink);
        app.poll(6_000, &mut hw, &mut sink);
        assert!(hw.file(RECOVERY_FILE).is_some());

        hw.storage_online = false;
        hw.latch = false;
        app.handle_event(Event::LatchToggled, &mut hw, &mut sink);
        assert!(!app.session().is_active());
        assert!(app.is_count_dirty(), "record deletion still pending");

        hw.storage_online = true;
        app.poll(20_000, &mut hw, &mut sink);
        app.poll(40_000, &mut hw, &mut sink);
        assert!(hw.file(RECOVERY_FILE).is_none());
        assert!(!app.is_count_dirty());
    }

    let (app, _sink) = boot(&mut hw);
    assert_eq!(app.mode(), Mode::Ready);
    assert!(!app.session().is_active());
    assert_eq!(app.session().current_count(), 2);
}
