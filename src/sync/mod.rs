//! Synchronization primitives built on the scheduler's block/wake (C5).

mod condvar;
mod mutex;

pub use condvar::Condvar;
pub use mutex::{Mutex, MutexGuard};
