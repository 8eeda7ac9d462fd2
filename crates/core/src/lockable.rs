//! # Overview
//!
//! [`Lockable`] is the synchronization wrapper embedded by value in every
//! entity with cross-thread exposure: producer sources, broker source and
//! stream records, and the communication channel. It pairs a mutex with a
//! condition variable so owners can both serialize mutation and park readers
//! until state changes.
//!
//! # Design
//!
//! The lock is intentionally **not** recursive. All call graphs in the
//! workspace are flattened so no code path reacquires a lock it already
//! holds: encoders and reencoders are plain state machines that never call
//! back into the entity that owns them. Guards are RAII values, so the mutex
//! is released on every exit path, and a condition wait atomically releases
//! the mutex and reacquires it before returning.
//!
//! # Examples
//!
//! ```
//! use svr_core::Lockable;
//!
//! let counter = Lockable::new(0u32);
//! {
//!     let mut guard = counter.lock();
//!     *guard += 1;
//! }
//! assert_eq!(*counter.lock(), 1);
//! ```

use parking_lot::{Condvar, Mutex, MutexGuard};

/// A mutex/condvar pair guarding a single entity's mutable state.
#[derive(Debug, Default)]
pub struct Lockable<T> {
    state: Mutex<T>,
    cond: Condvar,
}

impl<T> Lockable<T> {
    /// Wraps `value` in a fresh lock.
    pub const fn new(value: T) -> Self {
        Self {
            state: Mutex::new(value),
            cond: Condvar::new(),
        }
    }

    /// Acquires the lock, blocking until it is available.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.state.lock()
    }

    /// Atomically releases the lock and waits for a notification, then
    /// reacquires the lock before returning.
    pub fn wait(&self, guard: &mut MutexGuard<'_, T>) {
        self.cond.wait(guard);
    }

    /// Waits until `condition` returns `false` for the guarded state.
    ///
    /// Spurious wakeups are handled internally; on return the condition is
    /// guaranteed false and the lock is held.
    pub fn wait_while<F>(&self, guard: &mut MutexGuard<'_, T>, condition: F)
    where
        F: FnMut(&mut T) -> bool,
    {
        self.cond.wait_while(guard, condition);
    }

    /// Wakes one thread parked in [`Lockable::wait`] or
    /// [`Lockable::wait_while`].
    pub fn notify_one(&self) {
        self.cond.notify_one();
    }

    /// Wakes every thread parked on this lock's condition.
    pub fn notify_all(&self) {
        self.cond.notify_all();
    }

    /// Consumes the lock and returns the guarded value.
    pub fn into_inner(self) -> T {
        self.state.into_inner()
    }
}
