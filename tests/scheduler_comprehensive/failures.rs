//! Failure Handling Tests
//!
//! Transient failures keep the schedule; fatal control failures end it and
//! reach the caller of `run`.

use crate::*;
use std::io;

#[test]
fn test_transient_errors_never_stop_schedule() {
    init_tracing();
    let (clock, scheduler) = manual_scheduler(every(2).limit(6));
    let mut starts = Vec::new();

    let result = scheduler.run(|| {
        starts.push(clock.now());
        match starts.len() % 3 {
            0 => Err(TaskError::ServerConnection("connection refused".into())),
            1 => Err(TaskError::Timeout("no response in 20s".into())),
            _ => Err(TaskError::Other("malformed reply".into())),
        }
    });

    assert!(result.is_ok());
    assert_eq!(starts, (1..=6).map(|i| at(i * 2)).collect::<Vec<_>>());
}

#[test]
fn test_each_fatal_variant_propagates() {
    let fatal: Vec<fn() -> TaskError> = vec![
        || TaskError::ForceRestart("reconfigured".into()),
        || TaskError::ForceDisconnect("license".into()),
        || TaskError::Shutdown,
        || TaskError::OutOfMemory,
    ];
    for make in fatal {
        let (_clock, scheduler) = manual_scheduler(every(1).limit(100));
        let mut calls = 0;
        let result = scheduler.run(|| {
            calls += 1;
            if calls == 4 {
                Err(make())
            } else {
                Ok(())
            }
        });

        let err = result.unwrap_err();
        assert!(matches!(err, SchedulerError::Fatal(_)), "{}", err);
        assert_eq!(calls, 4);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }
}

#[test]
fn test_fatal_after_transient_failures() {
    let (_clock, scheduler) = manual_scheduler(every(1));
    let mut calls = 0;
    let result = scheduler.run(|| {
        calls += 1;
        match calls {
            1 | 2 => Err(TaskError::Timeout("slow".into())),
            3 => Ok(()),
            _ => Err(TaskError::Shutdown),
        }
    });
    assert!(matches!(result, Err(SchedulerError::Fatal(TaskError::Shutdown))));
    assert_eq!(scheduler.invocations(), 4);
}

#[test]
fn test_panics_are_contained() {
    let (_clock, scheduler) = manual_scheduler(every(1).limit(4));
    let mut calls = 0;
    let result = scheduler.run(|| {
        calls += 1;
        if calls % 2 == 1 {
            panic!("invocation {} failed hard", calls);
        }
        Ok::<(), TaskError>(())
    });
    assert!(result.is_ok());
    assert_eq!(calls, 4);
}

#[test]
fn test_io_errors_use_their_own_classification() {
    let (_clock, scheduler) = manual_scheduler(every(1).limit(10));
    let mut calls = 0;
    let result = scheduler.run(|| {
        calls += 1;
        match calls {
            1 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            2 => Err(io::Error::new(io::ErrorKind::InvalidData, "garbage")),
            _ => Err(io::Error::new(io::ErrorKind::OutOfMemory, "oom")),
        }
    });
    match result {
        Err(SchedulerError::Fatal(e)) => assert_eq!(e.kind(), io::ErrorKind::OutOfMemory),
        other => panic!("expected fatal io error, got {:?}", other),
    }
    assert_eq!(calls, 3);
}

#[test]
fn test_injected_classifier_overrides() {
    let (_clock, scheduler) = manual_scheduler(every(1).limit(3));
    let mut calls = 0;
    // treat everything as transient, even a restart directive
    let result = scheduler.run_with_classifier(
        || {
            calls += 1;
            Err(TaskError::ForceRestart("ignored".into()))
        },
        |_: &TaskError| FailureClass::TransientUnexpected,
    );
    assert!(result.is_ok());
    assert_eq!(calls, 3);
}

#[test]
fn test_invalid_period_rejected_before_running() {
    let (_clock, scheduler) = manual_scheduler(SchedulerConfig::new(Duration::ZERO));
    let mut ran = false;
    let result = scheduler.run(|| {
        ran = true;
        Ok::<(), TaskError>(())
    });
    assert!(matches!(result, Err(SchedulerError::InvalidPeriod)));
    assert!(!ran);
}
