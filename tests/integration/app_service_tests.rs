//! Integration tests for the event → AppService → ports pipeline.
//!
//! These run on the host (x86_64) and drive the service the way the main
//! loop does: events from the queue, `poll` with a millisecond tick, and
//! console commands, all against the in-memory board.

use crate::mock_hw::{LogSink, MockHardware, T0};

use prodcounter::app::commands::AppCommand;
use prodcounter::app::events::AppEvent;
use prodcounter::app::service::AppService;
use prodcounter::config::SystemConfig;
use prodcounter::error::{Rejection, TransitionError};
use prodcounter::events::{Event, EventQueue};
use prodcounter::fsm::Mode;
use prodcounter::fsm::guards::GuardContext;
use prodcounter::production::ledger::COUNT_FILE;
use prodcounter::production::recovery::RECOVERY_FILE;
use prodcounter::time::DateTime;

fn make_app() -> (AppService, MockHardware, LogSink) {
    let mut app = AppService::new(SystemConfig::default());
    app.set_health(GuardContext::healthy());
    let mut hw = MockHardware::new();
    let mut sink = LogSink::new();
    app.boot(&mut hw, &mut sink);
    (app, hw, sink)
}

fn start_production(app: &mut AppService, hw: &mut MockHardware, sink: &mut LogSink) {
    hw.latch = true;
    app.handle_event(Event::LatchToggled, hw, sink);
    assert_eq!(app.mode(), Mode::Production);
}

fn stop_production(app: &mut AppService, hw: &mut MockHardware, sink: &mut LogSink) {
    hw.latch = false;
    app.handle_event(Event::LatchToggled, hw, sink);
}

fn press(app: &mut AppService, hw: &mut MockHardware, sink: &mut LogSink, n: u32) {
    for _ in 0..n {
        app.handle_event(Event::CounterPressed, hw, sink);
    }
}

// ── Session lifecycle ─────────────────────────────────────────

#[test]
fn five_presses_produce_summary_of_five() {
    let (mut app, mut hw, mut sink) = make_app();

    start_production(&mut app, &mut hw, &mut sink);
    assert!(hw.file(RECOVERY_FILE).is_some(), "record written on start");

    press(&mut app, &mut hw, &mut sink, 5);
    stop_production(&mut app, &mut hw, &mut sink);

    assert_eq!(app.mode(), Mode::Ready);
    assert!(!app.session().is_active());
    assert_eq!(app.session().production_count(), 5);

    let summary = sink
        .events
        .iter()
        .find_map(|e| match e {
            AppEvent::SessionStopped(s) => Some(*s),
            _ => None,
        })
        .expect("SessionStopped emitted");
    assert_eq!(summary.production_count, 5);

    let file = hw
        .file("Production_20251112_081500_to_081500.txt")
        .expect("summary file written");
    assert!(file.starts_with("=== PRODUCTION SESSION ===\n"));
    assert!(file.contains("Production Count: 5\n"));

    let daily = hw.file("HourlyProduction_20251112.txt").expect("daily file");
    assert_eq!(daily, "---\nSession: 08:15:00 to 08:15:00\nCount: 5\n");

    assert!(hw.file(RECOVERY_FILE).is_none(), "record deleted on stop");
    assert_eq!(hw.file(COUNT_FILE), Some("5\n"));
}

#[test]
fn second_session_counts_from_new_baseline() {
    let (mut app, mut hw, mut sink) = make_app();

    start_production(&mut app, &mut hw, &mut sink);
    press(&mut app, &mut hw, &mut sink, 4);
    stop_production(&mut app, &mut hw, &mut sink);

    start_production(&mut app, &mut hw, &mut sink);
    assert_eq!(app.session().baseline_count(), 4);
    press(&mut app, &mut hw, &mut sink, 2);
    assert_eq!(app.session().current_count(), 6);
    assert_eq!(app.session().production_count(), 2);
}

#[test]
fn repeated_start_event_is_ignored() {
    let (mut app, mut hw, mut sink) = make_app();
    start_production(&mut app, &mut hw, &mut sink);
    press(&mut app, &mut hw, &mut sink, 3);

    app.handle_event(Event::ProductionStart, &mut hw, &mut sink);

    assert_eq!(app.mode(), Mode::Production);
    assert_eq!(app.session().baseline_count(), 0);
    assert_eq!(app.session().current_count(), 3);
}

#[test]
fn counting_saturates_at_max_count() {
    let (mut app, mut hw, mut sink) = make_app();
    let cfg = SystemConfig {
        max_count: 100,
        ..SystemConfig::default()
    };
    app.handle_command(AppCommand::UpdateConfig(cfg), &mut hw, &mut sink)
        .unwrap();

    start_production(&mut app, &mut hw, &mut sink);
    press(&mut app, &mut hw, &mut sink, 130);
    assert_eq!(app.session().current_count(), 100);
}

#[test]
fn invalid_clock_uses_fallback_stamp() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.now = None;

    start_production(&mut app, &mut hw, &mut sink);

    assert!(sink.contains(&AppEvent::SessionStarted {
        at: DateTime::FALLBACK,
        baseline: 0,
    }));
    assert_eq!(
        hw.file(RECOVERY_FILE),
        Some("0\n0\n2020\n1\n1\n0\n0\n0\n")
    );
}

// ── Mode arbitration ──────────────────────────────────────────

#[test]
fn diagnostic_refused_during_production() {
    let (mut app, mut hw, mut sink) = make_app();
    start_production(&mut app, &mut hw, &mut sink);

    app.handle_event(Event::DiagnosticRequest, &mut hw, &mut sink);

    assert_eq!(app.mode(), Mode::Production);
    assert!(app.session().is_active());
    assert!(sink.contains(&AppEvent::TransitionRejected(TransitionError {
        from: Mode::Production,
        to: Mode::Diagnostic,
        reason: Rejection::NotAdjacent,
    })));
}

#[test]
fn low_heap_blocks_production_start() {
    let (mut app, mut hw, mut sink) = make_app();
    app.set_heap_free(1_000);

    hw.latch = true;
    app.handle_event(Event::LatchToggled, &mut hw, &mut sink);

    assert_eq!(app.mode(), Mode::Ready);
    assert!(!app.session().is_active());
    assert!(sink.count_matching(|e| matches!(
        e,
        AppEvent::TransitionRejected(TransitionError {
            reason: Rejection::GuardFailed,
            ..
        })
    )) == 1);
}

#[test]
fn display_loss_blocks_start_but_not_counting() {
    let (mut app, mut hw, mut sink) = make_app();
    start_production(&mut app, &mut hw, &mut sink);

    app.handle_event(Event::DisplayUnavailable, &mut hw, &mut sink);
    press(&mut app, &mut hw, &mut sink, 2);
    assert_eq!(app.session().current_count(), 2);

    stop_production(&mut app, &mut hw, &mut sink);
    start_production_expect_refusal(&mut app, &mut hw, &mut sink);
}

fn start_production_expect_refusal(app: &mut AppService, hw: &mut MockHardware, sink: &mut LogSink) {
    hw.latch = true;
    app.handle_event(Event::LatchToggled, hw, sink);
    assert_eq!(app.mode(), Mode::Ready);
}

#[test]
fn error_during_production_closes_session() {
    let (mut app, mut hw, mut sink) = make_app();
    start_production(&mut app, &mut hw, &mut sink);
    press(&mut app, &mut hw, &mut sink, 7);

    app.handle_event(Event::ErrorDetected, &mut hw, &mut sink);

    assert_eq!(app.mode(), Mode::Error);
    assert!(!app.session().is_active());
    assert!(hw.file(RECOVERY_FILE).is_none());
    assert_eq!(hw.file(COUNT_FILE), Some("7\n"));
}

#[test]
fn error_auto_recovers_after_timeout() {
    let (mut app, mut hw, mut sink) = make_app();
    app.handle_event(Event::ErrorDetected, &mut hw, &mut sink);
    assert_eq!(app.mode(), Mode::Error);

    app.poll(1_000, &mut hw, &mut sink);
    assert_eq!(app.mode(), Mode::Error);
    app.poll(6_000, &mut hw, &mut sink);
    assert_eq!(app.mode(), Mode::Ready);
    assert!(sink.contains(&AppEvent::StateChanged {
        from: Mode::Error,
        to: Mode::Ready,
    }));
}

#[test]
fn passing_self_test_returns_to_ready() {
    let (mut app, mut hw, mut sink) = make_app();
    app.handle_event(Event::DiagnosticRequest, &mut hw, &mut sink);

    assert_eq!(app.mode(), Mode::Ready);
    assert!(sink.contains(&AppEvent::StateChanged {
        from: Mode::Ready,
        to: Mode::Diagnostic,
    }));
    assert!(sink.contains(&AppEvent::StateChanged {
        from: Mode::Diagnostic,
        to: Mode::Ready,
    }));
}

// ── Queue + persistence ───────────────────────────────────────

#[test]
fn queued_presses_drain_in_order_and_drops_are_reported() {
    let (mut app, mut hw, mut sink) = make_app();
    start_production(&mut app, &mut hw, &mut sink);

    let queue = EventQueue::new();
    for _ in 0..17 {
        queue.enqueue(Event::CounterPressed);
    }
    app.drain(&queue, &mut hw, &mut sink);

    assert!(queue.is_empty());
    assert_eq!(app.session().current_count(), 16);
    assert!(sink.contains(&AppEvent::EventsDropped(1)));
}

#[test]
fn count_saved_on_interval_only_when_dirty() {
    let (mut app, mut hw, mut sink) = make_app();
    start_production(&mut app, &mut hw, &mut sink);
    press(&mut app, &mut hw, &mut sink, 3);
    assert!(app.is_count_dirty());

    app.poll(1_000, &mut hw, &mut sink);
    assert!(app.is_count_dirty(), "interval not reached");

    app.poll(5_000, &mut hw, &mut sink);
    assert!(!app.is_count_dirty());
    assert!(sink.contains(&AppEvent::CountSaved(3)));
    assert_eq!(hw.file(COUNT_FILE), Some("3\n"));
    assert_eq!(
        hw.file(RECOVERY_FILE),
        Some("3\n0\n2025\n11\n12\n8\n15\n0\n")
    );

    let saves = sink.count_matching(|e| matches!(e, AppEvent::CountSaved(_)));
    app.poll(20_000, &mut hw, &mut sink);
    assert_eq!(
        sink.count_matching(|e| matches!(e, AppEvent::CountSaved(_))),
        saves,
        "clean count is not rewritten"
    );
}

#[test]
fn save_deferred_while_storage_offline() {
    let (mut app, mut hw, mut sink) = make_app();
    start_production(&mut app, &mut hw, &mut sink);
    press(&mut app, &mut hw, &mut sink, 2);

    hw.storage_online = false;
    app.poll(5_000, &mut hw, &mut sink);
    assert!(app.is_count_dirty());

    hw.storage_online = true;
    app.poll(10_000, &mut hw, &mut sink);
    assert!(!app.is_count_dirty());
    assert_eq!(hw.file(COUNT_FILE), Some("2\n"));
}

// ── Console commands ──────────────────────────────────────────

#[test]
fn time_set_updates_clock_and_health() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.now = None;
    app.handle_event(Event::RtcUnavailable, &mut hw, &mut sink);
    assert!(!app.health().clock_valid);

    let cmd = AppCommand::parse("TIME,2026-01-05 06:07:08").unwrap();
    app.handle_command(cmd, &mut hw, &mut sink).unwrap();

    let dt = DateTime::new(2026, 1, 5, 6, 7, 8);
    assert_eq!(hw.now, Some(dt));
    assert!(app.health().clock_valid);
    assert!(sink.contains(&AppEvent::TimeSet(dt)));
}

#[test]
fn reset_zeroes_idle_counts() {
    let (mut app, mut hw, mut sink) = make_app();
    start_production(&mut app, &mut hw, &mut sink);
    press(&mut app, &mut hw, &mut sink, 9);
    stop_production(&mut app, &mut hw, &mut sink);

    app.handle_command(AppCommand::ResetCounts, &mut hw, &mut sink)
        .unwrap();

    assert_eq!(app.session().current_count(), 0);
    assert_eq!(app.ledger().cumulative_count, 0);
    assert_eq!(hw.file(COUNT_FILE), Some("0\n"));
    assert!(sink.contains(&AppEvent::CountsReset));
}

#[test]
fn display_follows_mode_and_count() {
    let (mut app, mut hw, mut sink) = make_app();
    start_production(&mut app, &mut hw, &mut sink);
    press(&mut app, &mut hw, &mut sink, 2);
    assert_eq!(hw.displayed.last(), Some(&(Mode::Production, 2)));

    stop_production(&mut app, &mut hw, &mut sink);
    assert_eq!(hw.displayed.last(), Some(&(Mode::Ready, 2)));
    assert_eq!(hw.now, Some(T0));
}
