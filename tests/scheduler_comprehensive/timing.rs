//! Timing Tests
//!
//! First tick one period after start, skip-on-overrun, deadline and limit.

use crate::*;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tracewarden::advance_next_invocation;

#[test]
fn test_first_tick_one_period_after_start() {
    init_tracing();
    let (clock, scheduler) = manual_scheduler(every(30).limit(1));
    clock.set(at(100));

    let mut started = None;
    scheduler
        .run(|| {
            started = Some(clock.now());
            Ok::<(), TaskError>(())
        })
        .unwrap();
    assert_eq!(started, Some(at(130)));
}

#[test]
fn test_overrun_skips_missed_ticks() {
    let (clock, scheduler) = manual_scheduler(every(2).limit(4));
    let mut starts = Vec::new();
    let mut ends = Vec::new();

    scheduler
        .run(|| {
            starts.push(clock.now());
            clock.sleep(Duration::from_secs(5));
            ends.push(clock.now());
            Ok::<(), TaskError>(())
        })
        .unwrap();

    assert_eq!(starts, vec![at(2), at(8), at(14), at(20)]);
    // never re-invoked immediately after an overrun
    for (end, next_start) in ends.iter().zip(starts.iter().skip(1)) {
        assert!(next_start > end);
    }
}

#[test]
fn test_short_task_keeps_cadence() {
    let (clock, scheduler) = manual_scheduler(every(10).limit(5));
    let mut starts = Vec::new();
    scheduler
        .run(|| {
            starts.push(clock.now());
            clock.advance(Duration::from_secs(3));
            Ok::<(), TaskError>(())
        })
        .unwrap();
    assert_eq!(starts, vec![at(10), at(20), at(30), at(40), at(50)]);
}

#[test]
fn test_task_exactly_one_period_long() {
    let (clock, scheduler) = manual_scheduler(every(4).limit(3));
    let mut starts = Vec::new();
    scheduler
        .run(|| {
            starts.push(clock.now());
            clock.advance(Duration::from_secs(4));
            Ok::<(), TaskError>(())
        })
        .unwrap();
    assert_eq!(starts, vec![at(4), at(12), at(20)]);
}

#[test]
fn test_deadline_stops_loop() {
    let (clock, scheduler) = manual_scheduler(every(5).deadline(at(17)));
    let mut starts = Vec::new();
    scheduler
        .run(|| {
            starts.push(clock.now());
            Ok::<(), TaskError>(())
        })
        .unwrap();
    assert_eq!(starts, vec![at(5), at(10), at(15)]);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}

#[test]
fn test_deadline_already_passed_runs_nothing() {
    let (clock, scheduler) = manual_scheduler(every(5).deadline(at(1)));
    clock.set(at(2));
    scheduler.run(|| Ok::<(), TaskError>(())).unwrap();
    assert_eq!(scheduler.invocations(), 0);
}

#[test]
fn test_advance_next_invocation_table() {
    let period = Duration::from_secs(3);
    let cases = [
        (at(3), at(1), at(3)),
        (at(3), at(3), at(6)),
        (at(3), at(4), at(6)),
        (at(3), at(11), at(12)),
        (at(3), at(12), at(15)),
    ];
    for (next, now, expected) in cases {
        assert_eq!(
            advance_next_invocation(next, period, now),
            expected,
            "next={} now={}",
            next,
            now
        );
    }
}

#[test]
fn test_stop_from_task_ends_after_current_invocation() {
    let (_clock, scheduler) = manual_scheduler(every(1));
    let scheduler = Arc::new(scheduler);
    let handle = Arc::clone(&scheduler);
    let mut calls = 0;
    scheduler
        .run(|| {
            calls += 1;
            if calls == 3 {
                handle.stop();
            }
            Ok::<(), TaskError>(())
        })
        .unwrap();
    assert_eq!(calls, 3);
    assert_eq!(scheduler.invocations(), 3);
}

#[test]
fn test_spawned_scheduler_stops_promptly() {
    let scheduler = Arc::new(PeriodicScheduler::new(
        SchedulerConfig::new(Duration::from_millis(2)).name("spawned"),
        SharedTaskLock::new(),
        Arc::new(SystemClock),
    ));
    let handle = scheduler.spawn(|| Ok::<(), TaskError>(())).unwrap();

    while scheduler.invocations() < 3 {
        std::thread::sleep(Duration::from_millis(1));
    }
    scheduler.stop();
    assert!(handle.join().unwrap().is_ok());
    assert_eq!(scheduler.state(), SchedulerState::Stopped);

    // can be started again once stopped
    let handle = scheduler.spawn(|| Ok::<(), TaskError>(())).unwrap();
    scheduler.stop();
    assert!(handle.join().unwrap().is_ok());
}

#[test]
fn test_respawn_after_stop_never_runs_two_loops() {
    let scheduler = Arc::new(PeriodicScheduler::new(
        SchedulerConfig::new(Duration::from_millis(200)).name("respawn"),
        SharedTaskLock::new(),
        Arc::new(SystemClock),
    ));
    let first_runs = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&first_runs);
    let first = scheduler
        .spawn(move || {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
            Ok::<(), TaskError>(())
        })
        .unwrap();

    std::thread::sleep(Duration::from_millis(20));
    scheduler.stop();

    // rejected until the stopped loop has really exited
    let second = loop {
        match scheduler.spawn(|| Ok::<(), TaskError>(())) {
            Ok(handle) => break handle,
            Err(SchedulerError::AlreadyRunning) => std::thread::sleep(Duration::from_millis(1)),
            Err(e) => panic!("unexpected spawn error: {}", e),
        }
    };
    assert!(first.join().unwrap().is_ok());

    std::thread::sleep(Duration::from_millis(450));
    scheduler.stop();
    assert!(second.join().unwrap().is_ok());

    assert_eq!(first_runs.load(AtomicOrdering::SeqCst), 0);
    assert!(scheduler.invocations() >= 1);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}
