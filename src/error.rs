/*
 * Error Types
 *
 * The recoverable half of the error taxonomy: argument errors, identity
 * errors, deadlock detection, and resource exhaustion. Fatal precondition
 * violations (unlock by a non-owner, switching with no runnable thread,
 * returning from a dead thread) are not modeled here -- they panic at the
 * point of violation, by design.
 */

use std::fmt;

/// Errors recorded in a thread's `errno` slot and returned by fallible
/// scheduler operations.
///
/// Mirrors the historical `ESRCH` / `EINVAL` / `EDEADLK` taxonomy: each
/// variant corresponds to exactly one of those conditions so that callers
/// porting code from the errno-based API can match one-for-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadError {
    /// `id` does not refer to an allocated thread.
    NoSuchThread,
    /// The operation's arguments are invalid for the target's current state
    /// (bad priority, joining a non-joinable thread, double-join).
    InvalidArgument,
    /// A thread attempted to join itself.
    DeadlockWouldOccur,
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadError::NoSuchThread => write!(f, "no such thread (ESRCH)"),
            ThreadError::InvalidArgument => write!(f, "invalid argument (EINVAL)"),
            ThreadError::DeadlockWouldOccur => write!(f, "operation would deadlock (EDEADLK)"),
        }
    }
}

impl std::error::Error for ThreadError {}

/// Why `create` failed to produce a new thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateError {
    /// The thread table has no free slot.
    NoFreeSlot,
    /// The stack for the new thread could not be allocated.
    StackAllocation,
}

impl fmt::Display for CreateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateError::NoFreeSlot => write!(f, "thread table is full"),
            CreateError::StackAllocation => write!(f, "failed to allocate thread stack"),
        }
    }
}

impl std::error::Error for CreateError {}

/// Why a `RuntimeConfig` was rejected by `init_with_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `maxprio` must allow at least one priority level.
    PriorityRangeTooSmall,
    /// `stack_size` is too small to hold the trampoline's minimum frame.
    StackTooSmall,
    /// `max_uthreads` must hold at least the first thread and the reaper.
    TooFewSlots,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::PriorityRangeTooSmall => write!(f, "maxprio must be at least 1"),
            ConfigError::StackTooSmall => write!(f, "stack_size is too small"),
            ConfigError::TooFewSlots => write!(f, "max_uthreads must be at least 2"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_error_display_mirrors_the_errno_taxonomy() {
        assert_eq!(ThreadError::NoSuchThread.to_string(), "no such thread (ESRCH)");
        assert_eq!(ThreadError::InvalidArgument.to_string(), "invalid argument (EINVAL)");
        assert_eq!(ThreadError::DeadlockWouldOccur.to_string(), "operation would deadlock (EDEADLK)");
    }

    #[test]
    fn create_error_display_is_human_readable() {
        assert_eq!(CreateError::NoFreeSlot.to_string(), "thread table is full");
        assert_eq!(CreateError::StackAllocation.to_string(), "failed to allocate thread stack");
    }

    #[test]
    fn config_error_display_is_human_readable() {
        assert_eq!(ConfigError::PriorityRangeTooSmall.to_string(), "maxprio must be at least 1");
        assert_eq!(ConfigError::StackTooSmall.to_string(), "stack_size is too small");
        assert_eq!(ConfigError::TooFewSlots.to_string(), "max_uthreads must be at least 2");
    }
}
