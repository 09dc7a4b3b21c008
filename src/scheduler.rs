//! Cooperative "run later" scheduler
//!
//! The one universal rule of this crate is that continuations never run
//! synchronously inside the call that triggers them; they are posted here and
//! run on a later turn. Any host with a run-later primitive satisfies the same
//! contract; this implementation is a plain FIFO job queue that callers drive
//! with [`Scheduler::turn`] or [`Scheduler::run_until_idle`].
//!
//! Jobs are polled under `std::panic::catch_unwind` so a panicking
//! continuation cannot take the rest of the queue down with it.

use crossbeam_queue::SegQueue;
use std::sync::Arc;

type Job = Box<dyn FnOnce() + Send>;

/// A cheaply cloneable handle to a shared job queue.
#[derive(Clone)]
pub struct Scheduler {
    queue: Arc<SegQueue<Job>>,
}

impl Scheduler {
    /// Create a new, empty scheduler.
    pub fn new() -> Self {
        Self {
            queue: Arc::new(SegQueue::new()),
        }
    }

    /// Enqueue a job. It never runs inline with this call.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        self.queue.push(Box::new(job));
    }

    /// Run one scheduler turn: exactly the jobs that were queued when the
    /// turn started. Jobs posted while the turn runs wait for a later turn,
    /// which is what gives `cancel` handlers their "after this call returns,
    /// before later work" ordering. Returns whether any job ran.
    pub fn turn(&self) -> bool {
        let queued = self.queue.len();
        let mut ran = false;

        for _ in 0..queued {
            let Some(job) = self.queue.pop() else { break };
            ran = true;

            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || job()));
            if outcome.is_err() {
                tracing::error!("scheduled job panicked; continuing with remaining jobs");
            }
        }

        ran
    }

    /// Run turns until the queue is empty.
    pub fn run_until_idle(&self) {
        while self.turn() {}
    }

    /// Number of jobs currently queued.
    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
