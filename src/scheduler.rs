/*
 * Scheduler (C3)
 *
 * Priority-indexed round-robin: one FIFO ready queue per priority level,
 * and "run the highest-priority non-empty queue's head" as the only
 * policy. Purely mechanical -- actually switching contexts, and deciding
 * when a thread becomes runnable or blocks, is runtime.rs's job; this
 * module only tracks which queue each runnable thread sits in.
 */

use log::{debug, error, trace};

use crate::queue::Queue;
use crate::thread::{Thread, ThreadId, ThreadState};

/// One ready queue per priority level, `0..=maxprio`.
pub struct Scheduler {
    runq: Vec<Queue>,
}

impl Scheduler {
    pub fn new(maxprio: u8) -> Self {
        Scheduler { runq: vec![Queue::new(); maxprio as usize + 1] }
    }

    pub fn maxprio(&self) -> u8 {
        (self.runq.len() - 1) as u8
    }

    /// Mark `id` `RUNNABLE` and enqueue it on its priority's ready queue.
    pub fn enqueue_runnable(&mut self, threads: &mut [Thread], id: ThreadId) {
        let prio = threads[id.index()].prio;
        threads[id.index()].state = ThreadState::Runnable;
        self.runq[prio as usize].enqueue(threads, id);
        trace!("uthreads: {} -> RUNNABLE (prio {})", id, prio);
    }

    /// Unlink `id` from the ready queue for `prio`, without touching its
    /// state. Used when a thread's priority changes while it's runnable,
    /// just before it's re-enqueued at the new priority.
    pub fn remove_from_runq(&mut self, threads: &mut [Thread], id: ThreadId, prio: u8) {
        self.runq[prio as usize].remove(threads, id);
    }

    /// The priority of the highest non-empty ready queue, if any.
    pub fn highest_runnable_prio(&self) -> Option<u8> {
        self.runq
            .iter()
            .enumerate()
            .rev()
            .find(|(_, q)| !q.is_empty())
            .map(|(prio, _)| prio as u8)
    }

    /// Pop the head of the highest-priority non-empty ready queue.
    ///
    /// # Panics
    /// If no thread is runnable anywhere. The reaper thread is always
    /// either running or runnable, so a correctly-initialized runtime
    /// should never reach this; it's the scheduler's invariant to enforce,
    /// not a recoverable error.
    pub fn dequeue_highest(&mut self, threads: &mut [Thread]) -> ThreadId {
        match self.highest_runnable_prio() {
            Some(prio) => {
                let id = self.runq[prio as usize]
                    .dequeue(threads)
                    .expect("highest_runnable_prio named a non-empty queue");
                debug!("uthreads: scheduling {} (prio {})", id, prio);
                id
            }
            None => {
                error!("uthreads: no runnable thread, scheduler has nothing to run");
                panic!("uthreads: no runnable thread");
            }
        }
    }
}
