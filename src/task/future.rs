//! Future handles
//!
//! A single-assignment, single-consumption result slot shared between a
//! submitted operation and its caller. The worker side holds the promise,
//! the caller holds the future; the value crosses over exactly once.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// State of the shared slot
enum Slot<T> {
    /// No result yet
    Pending,

    /// Result deposited, not yet consumed
    Ready(T),

    /// The worker side went away without depositing a result
    Abandoned,
}

/// State shared between a future and its promise
struct Shared<T> {
    slot: Mutex<Slot<T>>,
    cond: Condvar,
}

/// Caller-side handle to the eventual result of a submitted operation
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

/// Worker-side handle that deposits the result
pub(crate) struct Promise<T> {
    shared: Arc<Shared<T>>,
    fulfilled: bool,
}

impl<T> Future<T> {
    /// Create a connected future/promise pair
    pub(crate) fn pair() -> (Future<T>, Promise<T>) {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot::Pending),
            cond: Condvar::new(),
        });
        (
            Future {
                shared: Arc::clone(&shared),
            },
            Promise {
                shared,
                fulfilled: false,
            },
        )
    }

    /// Await the operation
    ///
    /// Blocks until the result is deposited or `timeout_secs` elapses; a
    /// negative timeout waits without bound. Returns whether the operation
    /// has finished. Non-consuming: may be called repeatedly.
    pub fn wait(&self, timeout_secs: f64) -> bool {
        let mut slot = self.shared.slot.lock();
        if timeout_secs < 0.0 || !timeout_secs.is_finite() {
            self.shared
                .cond
                .wait_while(&mut slot, |s| matches!(s, Slot::Pending));
            true
        } else {
            // Clamp to keep Duration construction in range
            let timeout = Duration::from_secs_f64(timeout_secs.min(1e9));
            let result =
                self.shared
                    .cond
                    .wait_while_for(&mut slot, |s| matches!(s, Slot::Pending), timeout);
            !result.timed_out()
        }
    }

    /// Await the operation and take its result
    ///
    /// Blocks until the result is deposited, consumes the future and releases
    /// its resources. Consumption is exactly-once by construction: the handle
    /// is gone after this call.
    ///
    /// # Panics
    ///
    /// Panics if the worker abandoned the operation without a result.
    pub fn get(self) -> T {
        let mut slot = self.shared.slot.lock();
        self.shared
            .cond
            .wait_while(&mut slot, |s| matches!(s, Slot::Pending));
        match std::mem::replace(&mut *slot, Slot::Abandoned) {
            Slot::Ready(value) => value,
            _ => panic!("future was abandoned by its worker"),
        }
    }
}

impl<T> Promise<T> {
    /// Deposit the result and wake all waiters
    pub(crate) fn fulfill(mut self, value: T) {
        let mut slot = self.shared.slot.lock();
        *slot = Slot::Ready(value);
        self.fulfilled = true;
        drop(slot);
        self.shared.cond.notify_all();
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        // A promise dropped without fulfilling would leave waiters parked
        // forever; mark the slot so they fail loudly instead
        if !self.fulfilled {
            let mut slot = self.shared.slot.lock();
            if matches!(*slot, Slot::Pending) {
                *slot = Slot::Abandoned;
            }
            drop(slot);
            self.shared.cond.notify_all();
        }
    }
}
