/*
 * Runtime (C4, plus the glue C3 needs to actually switch)
 *
 * A thread-confined singleton: `RUNTIME` lives in `thread_local!` storage
 * rather than behind a `static` + `unsafe impl Sync`, so the type system
 * itself enforces that a `Runtime` is only ever touched by the one OS
 * thread that created it -- there is no way to hand a `Runtime` (or
 * anything borrowed from one) to another OS thread and have it compile.
 *
 * The one recurring discipline every function here follows: compute
 * whatever the next step needs while holding a `RefCell` borrow of
 * `RUNTIME`, then drop that borrow before calling anything that might
 * context-switch (`context::swap`) or re-enter `RUNTIME` itself (the
 * `Mutex`/`Condvar` primitives, which call back into `current_id`/
 * `block_current`/`wake`). Holding the borrow across either would panic
 * with `BorrowMutError` the first time two logical threads' control flow
 * actually interleaved on the one real stack.
 */

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::context::{self, RawContext};
use crate::error::{ConfigError, CreateError, ThreadError};
use crate::scheduler::Scheduler;
use crate::stack::Stack;
use crate::sync::{Condvar, Mutex};
use crate::thread::{DetachState, Entry, ExitValue, Thread, ThreadId, ThreadState};

thread_local! {
    static RUNTIME: RefCell<Option<Runtime>> = RefCell::new(None);
}

/// The reaper's own wait queue, built on the crate's own [`Mutex`]/
/// [`Condvar`] rather than anything more primitive -- the reaper is an
/// ordinary uthread and waits the ordinary way.
struct ReapQueue {
    pending: Mutex<VecDeque<ThreadId>>,
    cond: Condvar,
}

struct Runtime {
    config: RuntimeConfig,
    threads: Vec<Thread>,
    scheduler: Scheduler,
    current: ThreadId,
    reaper_id: ThreadId,
    reap: Rc<ReapQueue>,
}

/// Initialize the runtime on the calling OS thread with
/// [`RuntimeConfig::default`].
///
/// # Panics
/// If a runtime is already initialized on this OS thread.
pub fn init() {
    init_with_config(RuntimeConfig::default()).expect("uthreads: default config is always valid");
}

/// Initialize the runtime on the calling OS thread with a custom
/// configuration.
///
/// # Panics
/// If a runtime is already initialized on this OS thread.
pub fn init_with_config(config: RuntimeConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let maxprio = config.maxprio;

    RUNTIME.with(|r| {
        let mut rt = r.borrow_mut();
        assert!(rt.is_none(), "uthreads: runtime already initialized on this OS thread");

        let mut threads: Vec<Thread> = Vec::with_capacity(config.max_uthreads);
        for i in 0..config.max_uthreads {
            threads.push(Thread::empty(ThreadId::new(i)));
        }
        // Slot 0 is the OS thread calling init(), promoted in place: its
        // context is never explicitly captured here because its first
        // voluntary `swap` will save it for us (see context.rs).
        threads[0].state = ThreadState::OnCpu;
        threads[0].prio = maxprio;
        threads[0].detach_state = DetachState::Detachable;

        *rt = Some(Runtime {
            config,
            threads,
            scheduler: Scheduler::new(maxprio),
            current: ThreadId::new(0),
            reaper_id: ThreadId::new(0),
            reap: Rc::new(ReapQueue { pending: Mutex::new(VecDeque::new()), cond: Condvar::new() }),
        });
    });

    let reaper_id = create(reaper_body, maxprio, DetachState::Detachable)
        .expect("uthreads: failed to create reaper thread");
    RUNTIME.with(|r| r.borrow_mut().as_mut().unwrap().reaper_id = reaper_id);

    info!("uthreads: runtime initialized ({} slots, maxprio {})", config.max_uthreads, maxprio);
    Ok(())
}

/// Spawn a new thread running `f` to completion, at the given priority and
/// detach state. Whatever `f` returns becomes its exit value.
pub fn create<F, T>(f: F, prio: u8, detach: DetachState) -> Result<ThreadId, CreateError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let maxprio = RUNTIME.with(|r| r.borrow().as_ref().expect("uthreads: runtime not initialized").scheduler.maxprio());
    let prio = prio.min(maxprio);

    let id = RUNTIME.with(|r| -> Result<ThreadId, CreateError> {
        let mut rt = r.borrow_mut();
        let rt = rt.as_mut().expect("uthreads: runtime not initialized");

        let slot = rt
            .threads
            .iter()
            .skip(1)
            .find(|t| t.state == ThreadState::NoState)
            .map(|t| t.id())
            .ok_or(CreateError::NoFreeSlot)?;

        let mut stack = Stack::new(rt.config.stack_size);
        unsafe {
            context::make_context(&mut rt.threads[slot.index()].ctx, stack.as_mut_slice(), trampoline);
        }

        let boxed: Entry = Box::new(move || -> ExitValue { Box::new(f()) });

        let t = &mut rt.threads[slot.index()];
        t.stack = Some(stack);
        t.entry = Some(boxed);
        t.detach_state = detach;
        t.has_exited = false;
        t.exit_value = None;
        t.errno = None;
        t.no_preempt_count = 0;
        t.waiter = None;
        t.state = ThreadState::Transition;

        debug!("uthreads: created {} (requested prio {})", slot, prio);
        Ok(slot)
    })?;

    // A fresh thread is `TRANSITION`, not `RUNNABLE`: this does not
    // preempt the caller, matching the original's behavior of not
    // yielding on create even for a higher-priority child.
    set_prio(id, prio).expect("uthreads: set_prio on a freshly created thread cannot fail");
    Ok(id)
}

/// Terminate the calling thread, making `value` available to a joiner.
///
/// # Panics
/// Never returns; control only reaches the end of this function if the
/// scheduler switched back into a thread slot that has already exited,
/// which is a fatal runtime bug.
pub fn exit<T: Send + 'static>(value: T) -> ! {
    exit_current(Box::new(value))
}

fn exit_current(value: ExitValue) -> ! {
    let me = current_id();
    let (detach_state, waiter) = RUNTIME.with(|r| {
        let mut rt = r.borrow_mut();
        let rt = rt.as_mut().unwrap();
        assert_eq!(rt.threads[me.index()].state, ThreadState::OnCpu, "uthreads: exit from a non-running thread");
        rt.threads[me.index()].has_exited = true;
        rt.threads[me.index()].exit_value = Some(value);
        rt.threads[me.index()].state = ThreadState::Zombie;
        (rt.threads[me.index()].detach_state, rt.threads[me.index()].waiter)
    });

    debug!("uthreads: {} exiting ({:?})", me, detach_state);
    match detach_state {
        DetachState::Joinable => match waiter {
            Some(w) => wake(w),
            None => warn!("uthreads: {} exited joinable with no waiter; will leak unless joined", me),
        },
        DetachState::Detachable => make_reapable(me),
    }

    switch();
    unreachable!("uthreads: resumed a thread that already exited");
}

/// Block until `target` has exited, then return its exit value.
pub fn join(target: ThreadId) -> Result<ExitValue, ThreadError> {
    let me = current_id();

    let already_exited = RUNTIME.with(|r| -> Result<bool, ThreadError> {
        let mut rt = r.borrow_mut();
        let rt = rt.as_mut().unwrap();

        if target.index() >= rt.threads.len() || rt.threads[target.index()].state == ThreadState::NoState {
            rt.threads[me.index()].errno = Some(ThreadError::NoSuchThread);
            return Err(ThreadError::NoSuchThread);
        }
        if target == me {
            rt.threads[me.index()].errno = Some(ThreadError::DeadlockWouldOccur);
            return Err(ThreadError::DeadlockWouldOccur);
        }
        if let Some(existing) = rt.threads[target.index()].waiter {
            if existing != me {
                rt.threads[me.index()].errno = Some(ThreadError::InvalidArgument);
                return Err(ThreadError::InvalidArgument);
            }
        }
        if rt.threads[target.index()].detach_state != DetachState::Joinable {
            rt.threads[me.index()].errno = Some(ThreadError::InvalidArgument);
            return Err(ThreadError::InvalidArgument);
        }

        if rt.threads[target.index()].state == ThreadState::Zombie {
            Ok(true)
        } else {
            rt.threads[target.index()].waiter = Some(me);
            Ok(false)
        }
    })?;

    if !already_exited {
        block_current();
    }

    let value = RUNTIME.with(|r| {
        let mut rt = r.borrow_mut();
        let rt = rt.as_mut().unwrap();
        rt.threads[target.index()]
            .exit_value
            .take()
            .expect("uthreads: joined thread has no exit value")
    });
    make_reapable(target);
    debug!("uthreads: {} joined {}", me, target);
    Ok(value)
}

/// The id of the calling thread.
pub fn current_id() -> ThreadId {
    RUNTIME.with(|r| r.borrow().as_ref().expect("uthreads: runtime not initialized").current)
}

/// The last recoverable error recorded against the calling thread, mirroring
/// the original `errno`-style contract. Not cleared on success, matching the
/// conventional `errno` semantics it stands in for.
pub fn last_error() -> Option<ThreadError> {
    RUNTIME.with(|r| {
        let rt = r.borrow();
        let rt = rt.as_ref().expect("uthreads: runtime not initialized");
        rt.threads[rt.current.index()].errno
    })
}

/// Yield the CPU. The calling thread stays `RUNNABLE` and resumes once
/// it's again the highest-priority ready thread.
pub fn yield_now() {
    RUNTIME.with(|r| {
        let mut rt = r.borrow_mut();
        let rt = rt.as_mut().unwrap();
        let cur = rt.current;
        rt.scheduler.enqueue_runnable(&mut rt.threads, cur);
    });
    switch();
}

/// Change `id`'s priority. Only a `RUNNABLE` or `TRANSITION` thread can be
/// reprioritized; any other state (including the caller's own, which is
/// always `ON_CPU`) fails without setting `errno`, matching the original's
/// plain `return 0`. If this raises a currently-`RUNNABLE` thread above the
/// caller's own priority, the caller yields immediately.
pub fn set_prio(id: ThreadId, prio: u8) -> Result<(), ThreadError> {
    let should_yield = RUNTIME.with(|r| -> Result<bool, ThreadError> {
        let mut rt = r.borrow_mut();
        let rt = rt.as_mut().unwrap();

        let me = rt.current;
        if prio > rt.scheduler.maxprio() {
            rt.threads[me.index()].errno = Some(ThreadError::InvalidArgument);
            return Err(ThreadError::InvalidArgument);
        }
        if id.index() >= rt.threads.len() {
            rt.threads[me.index()].errno = Some(ThreadError::NoSuchThread);
            return Err(ThreadError::NoSuchThread);
        }

        match rt.threads[id.index()].state {
            ThreadState::NoState | ThreadState::Zombie => {
                rt.threads[me.index()].errno = Some(ThreadError::NoSuchThread);
                Err(ThreadError::NoSuchThread)
            }
            ThreadState::Runnable => {
                let old_prio = rt.threads[id.index()].prio;
                rt.scheduler.remove_from_runq(&mut rt.threads, id, old_prio);
                rt.threads[id.index()].prio = prio;
                rt.scheduler.enqueue_runnable(&mut rt.threads, id);
                let cur_prio = rt.threads[rt.current.index()].prio;
                debug!("uthreads: {} reprioritized {} -> {}", id, old_prio, prio);
                Ok(prio > cur_prio)
            }
            ThreadState::Transition => {
                rt.threads[id.index()].prio = prio;
                rt.scheduler.enqueue_runnable(&mut rt.threads, id);
                Ok(false)
            }
            // ON_CPU or WAIT: neither is reprioritizable. No errno is set,
            // matching the original's bare `return 0`.
            ThreadState::OnCpu | ThreadState::Wait => Err(ThreadError::InvalidArgument),
        }
    });

    if should_yield? {
        yield_now();
    }
    Ok(())
}

/// Block the calling thread until some other thread calls [`wake`] on it.
pub(crate) fn block_current() {
    RUNTIME.with(|r| {
        let mut rt = r.borrow_mut();
        let rt = rt.as_mut().unwrap();
        let cur = rt.current;
        match rt.threads[cur.index()].state {
            // Already transitioned to WAIT by the caller (e.g. `join`).
            ThreadState::Wait => {}
            ThreadState::OnCpu => {
                rt.threads[cur.index()].state = ThreadState::Wait;
            }
            ThreadState::Runnable => {
                let prio = rt.threads[cur.index()].prio;
                rt.scheduler.remove_from_runq(&mut rt.threads, cur, prio);
                rt.threads[cur.index()].state = ThreadState::Wait;
            }
            other => panic!("uthreads: block_current in invalid state {:?}", other),
        }
    });
    switch();
}

/// Make a blocked thread runnable again. A no-op if `id` isn't `WAIT`ing.
pub(crate) fn wake(id: ThreadId) {
    RUNTIME.with(|r| {
        let mut rt = r.borrow_mut();
        let rt = rt.as_mut().unwrap();
        if rt.threads[id.index()].state == ThreadState::Wait {
            rt.scheduler.enqueue_runnable(&mut rt.threads, id);
        }
    });
}

fn switch() {
    let next = RUNTIME.with(|r| {
        let mut rt = r.borrow_mut();
        let rt = rt.as_mut().unwrap();
        rt.scheduler.dequeue_highest(&mut rt.threads)
    });
    switch_to(next);
}

fn switch_to(next: ThreadId) {
    let (old_ptr, new_ptr) = RUNTIME.with(|r| {
        let mut rt = r.borrow_mut();
        let rt = rt.as_mut().unwrap();
        let old = rt.current;
        rt.threads[next.index()].state = ThreadState::OnCpu;
        rt.current = next;
        let old_ptr = &mut rt.threads[old.index()].ctx as *mut RawContext;
        let new_ptr = &rt.threads[next.index()].ctx as *const RawContext;
        (old_ptr, new_ptr)
    });
    // Thread table capacity is fixed at init and never reallocated, so
    // these pointers stay valid for as long as any thread might swap
    // back into `old`, however much later that is.
    unsafe {
        context::swap(old_ptr, new_ptr);
    }
}

/// Entered via a bare `ret` the first time a freshly made context is
/// swapped into; looks up its own entry closure by consulting whichever
/// thread id the scheduler just made current.
extern "C" fn trampoline() -> ! {
    let entry = RUNTIME
        .with(|r| {
            let mut rt = r.borrow_mut();
            let rt = rt.as_mut().unwrap();
            let id = rt.current;
            rt.threads[id.index()].entry.take()
        })
        .expect("uthreads: trampoline entered with no entry closure");
    let value = entry();
    exit_current(value);
}

/// Queue an already-`ZOMBIE` thread for the reaper to destroy.
fn make_reapable(id: ThreadId) {
    debug_assert_eq!(
        RUNTIME.with(|r| r.borrow().as_ref().unwrap().threads[id.index()].state),
        ThreadState::Zombie,
        "uthreads: made reapable before reaching ZOMBIE"
    );
    let reap = RUNTIME.with(|r| r.borrow().as_ref().unwrap().reap.clone());
    let mut pending = reap.pending.lock();
    pending.push_back(id);
    reap.cond.signal();
}

fn destroy(id: ThreadId) {
    RUNTIME.with(|r| {
        let mut rt = r.borrow_mut();
        let rt = rt.as_mut().unwrap();
        assert_eq!(rt.threads[id.index()].state, ThreadState::Zombie, "uthreads: destroy of a non-zombie thread");
        rt.threads[id.index()] = Thread::empty(id);
        debug!("uthreads: destroyed {}", id);
    });
}

fn no_threads_left_but_reaper() -> bool {
    RUNTIME.with(|r| {
        let rt = r.borrow();
        let rt = rt.as_ref().unwrap();
        rt.threads
            .iter()
            .enumerate()
            .all(|(i, t)| i == rt.reaper_id.index() || t.state == ThreadState::NoState)
    })
}

fn reaper_body() {
    info!("uthreads: reaper started");
    let reap = RUNTIME.with(|r| r.borrow().as_ref().unwrap().reap.clone());
    loop {
        let mut pending = reap.pending.lock();
        while pending.is_empty() {
            pending = reap.cond.wait(pending);
        }
        let drained: Vec<ThreadId> = pending.drain(..).collect();
        drop(pending);

        for id in drained {
            destroy(id);
        }

        if no_threads_left_but_reaper() {
            // We leak the reaper's own stack deliberately: the process is
            // about to exit and there is nobody left to reap it.
            info!("uthreads: no more threads.");
            info!("uthreads: bye!");
            // This exact text is part of the documented contract, not just a
            // log record: it must appear on stderr even if the embedder
            // never installed a `log` backend.
            eprintln!("uthreads: no more threads.");
            eprintln!("uthreads: bye!");
            std::process::exit(0);
        }
    }
}
