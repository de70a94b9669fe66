//! Shared Lock Tests
//!
//! Independent schedulers holding handles to the same task lock never run
//! their tasks at the same time.

use crate::*;
use std::sync::atomic::{AtomicUsize, Ordering};

fn system_scheduler(name: &str, lock: &SharedTaskLock, limit: u64) -> Arc<PeriodicScheduler> {
    Arc::new(PeriodicScheduler::new(
        SchedulerConfig::new(Duration::from_millis(1))
            .limit(limit)
            .name(name),
        lock.clone(),
        Arc::new(SystemClock),
    ))
}

#[test]
fn test_schedulers_sharing_lock_never_overlap() {
    init_tracing();
    const LIMIT: u64 = 20;

    let lock = SharedTaskLock::new();
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = ["harvest", "metrics", "settings"]
        .into_iter()
        .map(|name| {
            let scheduler = system_scheduler(name, &lock, LIMIT);
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            let handle = scheduler
                .spawn(move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(2));
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<(), TaskError>(())
                })
                .unwrap();
            (scheduler, handle)
        })
        .collect();

    for (scheduler, handle) in handles {
        assert!(handle.join().unwrap().is_ok());
        assert_eq!(scheduler.invocations(), LIMIT);
    }
    assert_eq!(max_active.load(Ordering::SeqCst), 1);
    assert!(!lock.is_locked());
}

#[test]
fn test_lock_held_during_task() {
    let lock = SharedTaskLock::new();
    let scheduler = PeriodicScheduler::new(
        every(1).limit(2),
        lock.clone(),
        Arc::new(ManualClock::new(Timestamp::ZERO)),
    );

    let mut observed = Vec::new();
    scheduler
        .run(|| {
            observed.push(lock.is_locked());
            Ok::<(), TaskError>(())
        })
        .unwrap();
    assert_eq!(observed, vec![true, true]);
    assert!(!lock.is_locked());
}

#[test]
fn test_distinct_locks_are_independent() {
    let first = SharedTaskLock::new();
    let second = SharedTaskLock::new();
    let copy = first.clone();

    assert!(first.same_lock(&copy));
    assert!(!first.same_lock(&second));

    let _held = first.lock();
    assert!(copy.try_lock().is_none());
    assert!(second.try_lock().is_some());
}

#[test]
fn test_lock_released_after_panic() {
    let lock = SharedTaskLock::new();
    let scheduler = PeriodicScheduler::new(
        every(1).limit(2),
        lock.clone(),
        Arc::new(ManualClock::new(Timestamp::ZERO)),
    );

    let mut calls = 0;
    let result = scheduler.run(|| {
        calls += 1;
        if calls == 1 {
            panic!("task blew up while holding the lock");
        }
        Ok::<(), TaskError>(())
    });
    assert!(result.is_ok());
    assert_eq!(calls, 2);
    assert!(lock.try_lock().is_some());
}

#[test]
fn test_second_run_on_running_scheduler_rejected() {
    let (_clock, scheduler) = manual_scheduler(every(1).limit(1));
    let scheduler = Arc::new(scheduler);
    let inner = Arc::clone(&scheduler);

    let mut nested = None;
    scheduler
        .run(|| {
            nested = Some(inner.run(|| Ok::<(), TaskError>(())));
            Ok::<(), TaskError>(())
        })
        .unwrap();
    assert!(matches!(nested, Some(Err(SchedulerError::AlreadyRunning))));
}
