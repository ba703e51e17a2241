//! Shared-bus guard.
//!
//! One mutex per physical bus serializes all transactions on it. The guard
//! is held for the duration of exactly one transaction sequence, never
//! across a task's full reading cycle. The primary sensor bus and the
//! vibration sensor's bus are independent [`SharedBus`] values and may run
//! concurrently.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};

/// Mutual-exclusion wrapper around one physical bus.
pub struct SharedBus<B> {
    inner: Mutex<CriticalSectionRawMutex, B>,
}

impl<B> SharedBus<B> {
    pub const fn new(bus: B) -> Self {
        Self {
            inner: Mutex::new(bus),
        }
    }

    /// Acquire the exclusive lease, waiting for any in-flight transaction
    /// on this bus to finish.
    pub async fn lock(&self) -> MutexGuard<'_, CriticalSectionRawMutex, B> {
        self.inner.lock().await
    }

    /// Non-blocking acquire, for callers that must not yield.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, CriticalSectionRawMutex, B>> {
        self.inner.try_lock().ok()
    }
}

/// Last resort for peripheral bring-up failures that leave the node with no
/// useful work to do. Logs, then panics so the platform's reset path runs.
pub fn fatal_init(what: &str) -> ! {
    log::error!("fatal init failure: {}", what);
    panic!("fatal init failure: {}", what);
}
