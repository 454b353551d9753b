/*
 * Runtime Configuration
 *
 * The three tunables the original fixed as compile-time constants
 * (MAX_UTHREADS, MAXPRIO, STACK_SIZE) are exposed here as a small typed
 * struct so embedders can size the runtime without forking the crate.
 * `Default` reproduces the historical values exactly.
 */

use crate::error::ConfigError;

/// Minimum stack size we're willing to hand a thread: enough for the
/// trampoline's own frame plus a realistic body, with slack for safety.
const MIN_STACK_SIZE: usize = 16 * 1024;

/// Tunable limits for a [`Runtime`](crate::Runtime).
///
/// `max_uthreads` bounds the thread table (slot 0 is the promoted OS
/// thread, one more slot is reserved for the reaper). `maxprio` is the
/// inclusive top of the priority range `[0, maxprio]`. `stack_size` is the
/// byte size of every thread's stack, uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub max_uthreads: usize,
    pub maxprio: u8,
    pub stack_size: usize,
}

impl RuntimeConfig {
    /// Validate the configuration, returning the reason it was rejected.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.maxprio < 1 {
            return Err(ConfigError::PriorityRangeTooSmall);
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::StackTooSmall);
        }
        if self.max_uthreads < 2 {
            return Err(ConfigError::TooFewSlots);
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_uthreads: 128,
            maxprio: 7,
            stack_size: 64 * 1024,
        }
    }
}
