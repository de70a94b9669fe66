//! Process-wide task serialization
//!
//! Every periodic job in the agent runs under one [`SharedTaskLock`]. Two
//! independently scheduled jobs therefore never run at the same time, and
//! never contend for the same downstream resources (for example the single
//! outbound connection to the collector). Unrelated jobs are serialized as a
//! consequence.
//!
//! The lock is constructed once by the owner of the schedulers and cloned
//! into each of them; clones share the same underlying mutex.

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Cloneable handle to a single mutual-exclusion resource
#[derive(Debug, Clone, Default)]
pub struct SharedTaskLock {
    inner: Arc<Mutex<()>>,
}

impl SharedTaskLock {
    /// Create a new, independent lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is held
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.inner.lock()
    }

    /// Acquire the lock only if it is free
    pub fn try_lock(&self) -> Option<MutexGuard<'_, ()>> {
        self.inner.try_lock()
    }

    /// Whether some task currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Whether two handles guard the same resource
    pub fn same_lock(&self, other: &SharedTaskLock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of handles sharing this lock
    pub fn handles(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}
