/*
 * Condition Variable (C5)
 *
 * `wait` releases the associated mutex and blocks in one motion, and
 * re-acquires it before returning -- the caller never observes the mutex
 * unlocked without also being asleep. No spurious wakeups: a uthread only
 * becomes runnable again via `signal`/`broadcast`.
 */

use std::cell::RefCell;
use std::collections::VecDeque;

use log::trace;

use crate::runtime;
use crate::sync::mutex::{Mutex, MutexGuard};
use crate::thread::ThreadId;

/// A condition variable for use between uthreads, paired with a [`Mutex`]
/// the way `std::sync::Condvar` is paired with `std::sync::Mutex`.
pub struct Condvar {
    waiters: RefCell<VecDeque<ThreadId>>,
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

impl Condvar {
    pub fn new() -> Self {
        Condvar { waiters: RefCell::new(VecDeque::new()) }
    }

    /// Atomically unlock `guard`'s mutex and block, re-acquiring it before
    /// returning. The mutex is always locked again on return, even if this
    /// uthread was woken by a `signal`/`broadcast` meant for someone else.
    pub fn wait<'a, T: ?Sized>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        let mutex = guard.mutex;
        let me = runtime::current_id();
        self.waiters.borrow_mut().push_back(me);
        trace!("uthreads: {} waiting on condvar", me);
        drop(guard); // unlocks the mutex; may hand it straight to another waiter
        runtime::block_current();
        mutex.lock()
    }

    /// Wake one waiter, in FIFO order. A no-op if nobody is waiting.
    pub fn signal(&self) {
        if let Some(id) = self.waiters.borrow_mut().pop_front() {
            trace!("uthreads: condvar signaling {}", id);
            runtime::wake(id);
        }
    }

    /// Wake every current waiter.
    pub fn broadcast(&self) {
        let woken: Vec<ThreadId> = self.waiters.borrow_mut().drain(..).collect();
        trace!("uthreads: condvar broadcasting to {} waiters", woken.len());
        for id in woken {
            runtime::wake(id);
        }
    }
}
