/*
 * Mutex (C5)
 *
 * Direct-handoff mutex: `unlock` hands ownership straight to the next
 * waiter (if any) before waking it, so a woken `lock` call never
 * re-examines contention and a thread that hasn't been through the
 * waiters queue can never barge in ahead of one that has.
 *
 * Built entirely on the scheduler's block/wake primitives (runtime.rs);
 * there is no busy-waiting and no OS-level synchronization, since every
 * uthread that could possibly be touching a given `Mutex` runs on the one
 * OS thread that owns the whole runtime.
 */

use std::cell::{Cell, RefCell, UnsafeCell};
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};

use log::trace;

use crate::runtime;
use crate::thread::ThreadId;

/// A mutual-exclusion lock over a `T`, for use between uthreads.
///
/// Unlike `std::sync::Mutex`, this type is neither `Send` nor `Sync`: it is
/// only ever touched by uthreads running on the single OS thread that hosts
/// the runtime, so it carries no atomics and pays no cross-core cost.
pub struct Mutex<T: ?Sized> {
    owner: Cell<Option<ThreadId>>,
    waiters: RefCell<VecDeque<ThreadId>>,
    data: UnsafeCell<T>,
}

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Mutex {
            owner: Cell::new(None),
            waiters: RefCell::new(VecDeque::new()),
            data: UnsafeCell::new(value),
        }
    }

    /// Consume the mutex, returning the wrapped value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquire the lock, blocking the calling uthread if it's already held.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let me = runtime::current_id();
        if self.owner.get().is_none() {
            self.owner.set(Some(me));
        } else {
            trace!("uthreads: {} blocking on mutex (held by {:?})", me, self.owner.get());
            self.waiters.borrow_mut().push_back(me);
            runtime::block_current();
            debug_assert_eq!(self.owner.get(), Some(me), "woke without receiving ownership");
        }
        MutexGuard { mutex: self }
    }

    /// Acquire the lock without blocking, or return `None` if it's held.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let me = runtime::current_id();
        if self.owner.get().is_none() {
            self.owner.set(Some(me));
            Some(MutexGuard { mutex: self })
        } else {
            None
        }
    }

    /// Release the lock, handing it directly to the next waiter (if any)
    /// before waking it.
    ///
    /// # Panics
    /// If the calling uthread does not hold the lock.
    fn unlock(&self) {
        let me = runtime::current_id();
        assert_eq!(self.owner.get(), Some(me), "uthreads: mutex unlocked by non-owner");
        match self.waiters.borrow_mut().pop_front() {
            Some(next) => {
                self.owner.set(Some(next));
                trace!("uthreads: mutex handed off from {} to {}", me, next);
                runtime::wake(next);
            }
            None => self.owner.set(None),
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        match self.try_lock() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &"<locked>"),
        };
        d.finish()
    }
}

/// An RAII guard granting access to a [`Mutex`]'s data; unlocks on drop.
pub struct MutexGuard<'a, T: ?Sized> {
    pub(crate) mutex: &'a Mutex<T>,
}

impl<'a, T: ?Sized> Deref for MutexGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, T: ?Sized> DerefMut for MutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, T: ?Sized> Drop for MutexGuard<'a, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

// `lock`/`unlock` call into the runtime for the current thread's identity,
// so exercising contention needs a live scheduler; see tests/sync.rs.
