//! Fixed-period task scheduler
//!
//! [`PeriodicScheduler`] runs one task repeatedly, one period apart, until it
//! is stopped, reaches its deadline or invocation limit, or the task reports
//! a fatal control error.
//!
//! ## Timing
//!
//! The first invocation is due one period after `run` starts. After every
//! invocation the next due time moves forward in whole periods until it is in
//! the future again, so ticks missed while a task overran are skipped rather
//! than replayed back to back.
//!
//! ## Serialization
//!
//! Every invocation runs while holding the [`SharedTaskLock`] handed to the
//! scheduler at construction. Schedulers built with clones of the same lock
//! never run their tasks concurrently.
//!
//! ## Failures
//!
//! Each failure is classified into a [`FailureClass`]. Transient failures are
//! logged and the schedule continues unchanged; fatal control failures stop
//! the loop and are returned to the caller of `run`. A panicking task is
//! treated as a transient unexpected failure.

use crate::classify::{Classify, FailureClass};
use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracewarden_concurrency::SharedTaskLock;
use tracewarden_core::{Clock, Timestamp};

/// Longest single sleep while waiting for the next tick
///
/// Bounds how long `stop` takes to be noticed during a wait.
pub const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Whether a scheduler loop is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not looping
    Stopped,
    /// Inside `run` or on its spawned thread
    Running,
}

/// Runs a task at a fixed period
#[derive(Debug)]
pub struct PeriodicScheduler {
    config: SchedulerConfig,
    lock: SharedTaskLock,
    clock: Arc<dyn Clock>,
    /// Set while a loop owns this scheduler; cleared only when that loop exits
    active: AtomicBool,
    stop_requested: AtomicBool,
    invocations: AtomicU64,
    next_invocation: Mutex<Option<Timestamp>>,
}

impl PeriodicScheduler {
    /// Create a stopped scheduler
    pub fn new(config: SchedulerConfig, lock: SharedTaskLock, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            lock,
            clock,
            active: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            invocations: AtomicU64::new(0),
            next_invocation: Mutex::new(None),
        }
    }

    /// Configuration this scheduler was built with
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        if self.active.load(Ordering::Acquire) {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// Whether the loop is active
    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Number of completed task invocations, failed ones included
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Acquire)
    }

    /// When the next invocation is due, while running
    pub fn next_invocation(&self) -> Option<Timestamp> {
        *self.next_invocation.lock()
    }

    /// Ask the loop to exit
    ///
    /// An invocation already in progress runs to completion. A pending
    /// invocation that has not started yet is skipped. The scheduler reports
    /// `Running` until the loop has actually exited.
    pub fn stop(&self) {
        if !self.is_running() {
            return;
        }
        if !self.stop_requested.swap(true, Ordering::AcqRel) {
            tracing::debug!(scheduler = %self.config.name, "scheduler stop requested");
        }
    }

    /// Run `task` on the calling thread until the loop ends
    pub fn run<E, F>(&self, task: F) -> Result<(), SchedulerError<E>>
    where
        E: Classify + Display,
        F: FnMut() -> Result<(), E>,
    {
        self.run_with_classifier(task, |e: &E| e.classify())
    }

    /// Like [`run`](Self::run) with an explicit failure classifier
    pub fn run_with_classifier<E, F, C>(
        &self,
        task: F,
        classify: C,
    ) -> Result<(), SchedulerError<E>>
    where
        E: Display,
        F: FnMut() -> Result<(), E>,
        C: Fn(&E) -> FailureClass,
    {
        self.begin()?;
        self.run_loop(task, classify)
    }

    /// Run `task` on a dedicated thread named after the config
    pub fn spawn<E, F>(
        self: &Arc<Self>,
        task: F,
    ) -> Result<JoinHandle<Result<(), SchedulerError<E>>>, SchedulerError<E>>
    where
        E: Classify + Display + Send + 'static,
        F: FnMut() -> Result<(), E> + Send + 'static,
    {
        self.begin()?;
        let scheduler = Arc::clone(self);
        thread::Builder::new()
            .name(self.config.name.clone())
            .spawn(move || scheduler.run_loop(task, |e: &E| e.classify()))
            .map_err(|e| {
                self.active.store(false, Ordering::Release);
                tracing::error!(
                    scheduler = %self.config.name,
                    error = %e,
                    "failed to spawn scheduler thread"
                );
                SchedulerError::Spawn(e)
            })
    }

    fn begin<E>(&self) -> Result<(), SchedulerError<E>> {
        if self.config.period.is_zero() {
            return Err(SchedulerError::InvalidPeriod);
        }
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SchedulerError::AlreadyRunning)?;
        self.stop_requested.store(false, Ordering::Release);
        Ok(())
    }

    fn run_loop<E, F, C>(&self, mut task: F, classify: C) -> Result<(), SchedulerError<E>>
    where
        E: Display,
        F: FnMut() -> Result<(), E>,
        C: Fn(&E) -> FailureClass,
    {
        let name = self.config.name.as_str();
        let period = self.config.period;
        let mut next = self.clock.now() + period;
        *self.next_invocation.lock() = Some(next);
        tracing::debug!(
            scheduler = name,
            period_ms = period.as_millis() as u64,
            "scheduler started"
        );

        let result = loop {
            if !self.wait_until(next) {
                break Ok(());
            }

            let outcome = {
                let _guard = self.lock.lock();
                panic::catch_unwind(AssertUnwindSafe(&mut task))
            };
            let count = self.invocations.fetch_add(1, Ordering::AcqRel) + 1;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => match classify(&e) {
                    FailureClass::TransientExpected => {
                        tracing::debug!(
                            scheduler = name,
                            error = %e,
                            "task failed, retrying next period"
                        );
                    }
                    FailureClass::TransientUnexpected => {
                        tracing::error!(scheduler = name, error = %e, "task failed unexpectedly");
                    }
                    FailureClass::FatalControl => {
                        tracing::warn!(
                            scheduler = name,
                            error = %e,
                            "fatal control error, stopping scheduler"
                        );
                        break Err(SchedulerError::Fatal(e));
                    }
                },
                Err(payload) => {
                    tracing::error!(
                        scheduler = name,
                        panic = %panic_message(payload.as_ref()),
                        "task panicked"
                    );
                }
            }

            if self.config.limit.map_or(false, |limit| count >= limit) {
                tracing::debug!(scheduler = name, invocations = count, "invocation limit reached");
                break Ok(());
            }

            let now = self.clock.now();
            let advanced = advance_next_invocation(next, period, now);
            let skipped = ticks_between(next, advanced, period).saturating_sub(1);
            if skipped > 0 {
                tracing::debug!(
                    scheduler = name,
                    skipped,
                    "task overran its period, skipping ticks"
                );
            }
            next = advanced;
            *self.next_invocation.lock() = Some(next);
        };

        *self.next_invocation.lock() = None;
        self.active.store(false, Ordering::Release);
        tracing::debug!(scheduler = name, invocations = self.invocations(), "scheduler stopped");
        result
    }

    /// Wait for `next`; false when the loop should end instead
    fn wait_until(&self, next: Timestamp) -> bool {
        loop {
            if self.stop_requested.load(Ordering::Acquire) {
                return false;
            }
            let now = self.clock.now();
            if self.config.deadline.map_or(false, |deadline| now >= deadline) {
                return false;
            }
            if now >= next {
                return true;
            }
            self.clock.sleep(next.duration_since(now).min(WAIT_SLICE));
        }
    }
}

/// First time after `now` reachable from `next` in whole periods
///
/// Returns `next` unchanged when it is already in the future.
pub fn advance_next_invocation(next: Timestamp, period: Duration, now: Timestamp) -> Timestamp {
    if next > now {
        return next;
    }
    let period = period_micros(period);
    let behind = now.as_micros() - next.as_micros();
    let steps = behind / period + 1;
    Timestamp::from_micros(next.as_micros().saturating_add(steps.saturating_mul(period)))
}

fn ticks_between(from: Timestamp, to: Timestamp, period: Duration) -> u64 {
    to.as_micros().saturating_sub(from.as_micros()) / period_micros(period)
}

fn period_micros(period: Duration) -> u64 {
    u64::try_from(period.as_micros()).unwrap_or(u64::MAX).max(1)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
