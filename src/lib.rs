//! A cooperative, priority-scheduled user-space threading runtime.
//!
//! Modeled on the classic `uthread` library (itself named after
//! `<ucontext.h>`): a fixed-size table of lightweight threads, scheduled
//! strictly by priority with FIFO ordering within a level, all running on
//! one OS thread via hand-rolled context switching. Threads cooperate --
//! they run until they call [`yield_now`], block on a [`sync::Mutex`] or
//! [`sync::Condvar`], or [`exit`].
//!
//! # Example
//! ```no_run
//! uthreads::init();
//! let worker = uthreads::create(|| 42, uthreads::MAX_PRIO - 1, uthreads::DetachState::Joinable)
//!     .expect("thread table has room");
//! let value = uthreads::join(worker).expect("worker is joinable and not self");
//! assert_eq!(*value.downcast::<i32>().unwrap(), 42);
//! ```
//!
//! Everything here runs on a single OS thread: the runtime is confined to
//! the thread that calls [`init`] via `thread_local!` storage, and none of
//! its types are `Send` or `Sync`.

mod config;
mod context;
mod error;
mod queue;
mod runtime;
mod scheduler;
mod stack;
pub mod sync;
mod thread;

pub use config::RuntimeConfig;
pub use error::{ConfigError, CreateError, ThreadError};
pub use thread::{DetachState, ExitValue, ThreadId};

/// The default priority ceiling, reproducing the historical `UTH_MAXPRIO`.
pub const MAX_PRIO: u8 = 7;

/// Initialize the runtime on the calling OS thread with default limits.
///
/// # Panics
/// If a runtime is already initialized on this OS thread.
pub fn init() {
    runtime::init();
}

/// Initialize the runtime on the calling OS thread with a custom
/// [`RuntimeConfig`].
///
/// # Panics
/// If a runtime is already initialized on this OS thread.
pub fn init_with_config(config: RuntimeConfig) -> Result<(), ConfigError> {
    runtime::init_with_config(config)
}

/// Spawn a new thread running `f` to completion.
///
/// `prio` is clamped to the configured priority ceiling. Whatever `f`
/// returns becomes its exit value, retrievable with [`join`] if `detach`
/// is [`DetachState::Joinable`].
pub fn create<F, T>(f: F, prio: u8, detach: DetachState) -> Result<ThreadId, CreateError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    runtime::create(f, prio, detach)
}

/// Terminate the calling thread, making `value` available to a joiner.
pub fn exit<T: Send + 'static>(value: T) -> ! {
    runtime::exit(value)
}

/// Block until `target` exits, then return the value it exited with.
///
/// # Errors
/// - [`ThreadError::NoSuchThread`] if `target` does not name a live thread.
/// - [`ThreadError::DeadlockWouldOccur`] if `target` is the caller.
/// - [`ThreadError::InvalidArgument`] if `target` is already awaited by a
///   different thread, or is not [`DetachState::Joinable`].
pub fn join(target: ThreadId) -> Result<ExitValue, ThreadError> {
    runtime::join(target)
}

/// The id of the calling thread.
pub fn self_id() -> ThreadId {
    runtime::current_id()
}

/// The last recoverable error recorded against the calling thread, mirroring
/// the historical `errno`-style contract alongside the typed `Result`s
/// above. Not cleared on success.
pub fn last_error() -> Option<ThreadError> {
    runtime::last_error()
}

/// Yield the CPU. The calling thread remains runnable and resumes once
/// it's again the highest-priority ready thread.
pub fn yield_now() {
    runtime::yield_now();
}

/// Change `id`'s priority. Only a runnable or not-yet-scheduled thread can
/// be reprioritized; `id` naming the caller itself, or any other thread
/// that isn't runnable, fails. If this makes a runnable thread outrank the
/// caller, the caller yields before returning.
pub fn set_prio(id: ThreadId, prio: u8) -> Result<(), ThreadError> {
    runtime::set_prio(id, prio)
}
