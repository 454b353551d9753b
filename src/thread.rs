/*
 * Thread Data Model
 *
 * `Thread` holds everything the Data Model section of the spec lists
 * against each slot: identity, scheduling state, the raw context, the
 * owned stack, detach/exit bookkeeping, and the per-thread errno slot.
 * The thread table itself (the fixed-size array of these, indexed by id)
 * lives in runtime.rs, since its invariants are the scheduler's to keep.
 */

use std::any::Any;
use std::fmt;

use crate::context::RawContext;
use crate::error::ThreadError;
use crate::queue::Link;
use crate::stack::Stack;

/// A unique thread identifier; also the index of the thread's slot in the
/// fixed-size thread table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(usize);

impl ThreadId {
    pub(crate) const fn new(index: usize) -> Self {
        ThreadId(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A thread's position in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Slot is free.
    NoState,
    /// Created, not yet placed on a ready queue.
    Transition,
    /// On a ready queue, waiting for the CPU.
    Runnable,
    /// Currently executing. Exactly one thread has this state.
    OnCpu,
    /// Blocked on a mutex, condvar, or join.
    Wait,
    /// Exited, awaiting reclamation by the reaper.
    Zombie,
}

/// Whether a thread's termination can be observed with `join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachState {
    /// At most one other thread may `join` this one to collect its exit
    /// value; until joined (or forever, if never joined), its slot and
    /// stack are not reclaimed.
    Joinable,
    /// Reclaimed automatically by the reaper as soon as it exits.
    Detachable,
}

/// The value a thread exits with, type-erased. [`Thread::exit_value`] is
/// read once by the joiner (or dropped by the reaper for detached threads).
pub type ExitValue = Box<dyn Any + Send>;

/// The boxed body of a thread: runs once, and whatever it returns becomes
/// the thread's exit value (falling off the end is an implicit `exit`).
pub(crate) type Entry = Box<dyn FnOnce() -> ExitValue + Send>;

/// A single thread's slot in the thread table.
pub(crate) struct Thread {
    pub(crate) id: ThreadId,
    pub(crate) state: ThreadState,
    pub(crate) prio: u8,
    pub(crate) ctx: RawContext,
    pub(crate) stack: Option<Stack>,
    pub(crate) link: Link,
    pub(crate) detach_state: DetachState,
    pub(crate) has_exited: bool,
    pub(crate) exit_value: Option<ExitValue>,
    pub(crate) waiter: Option<ThreadId>,
    pub(crate) errno: Option<ThreadError>,
    pub(crate) no_preempt_count: u32,
    pub(crate) entry: Option<Entry>,
}

impl Thread {
    /// A freshly-zeroed, free slot at `id`.
    pub(crate) fn empty(id: ThreadId) -> Self {
        Thread {
            id,
            state: ThreadState::NoState,
            prio: 0,
            ctx: RawContext::default(),
            stack: None,
            link: Link::new(),
            detach_state: DetachState::Detachable,
            has_exited: false,
            exit_value: None,
            waiter: None,
            errno: None,
            no_preempt_count: 0,
            entry: None,
        }
    }

    pub(crate) fn id(&self) -> ThreadId {
        self.id
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("prio", &self.prio)
            .field("detach_state", &self.detach_state)
            .field("has_exited", &self.has_exited)
            .field("waiter", &self.waiter)
            .finish()
    }
}
