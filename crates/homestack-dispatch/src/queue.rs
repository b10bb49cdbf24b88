//! In-memory FIFO job queue
//!
//! VecDeque behind a mutex plus a `Notify` for waking idle workers. Jobs are
//! drained in submission order; there is no priority lane and no cross-app
//! ordering guarantee beyond FIFO.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{oneshot, Notify};
use uuid::Uuid;

use crate::event::Event;
use crate::runner::JobOutcome;

/// A queued unit of work with its completion channel
pub(crate) struct Job {
    pub id: Uuid,
    pub event: Event,
    pub done: oneshot::Sender<JobOutcome>,
}

/// FIFO queue shared between the dispatcher and its workers
pub(crate) struct JobQueue {
    jobs: Mutex<VecDeque<Job>>,
    notify: Notify,
    closed: AtomicBool,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue a job. Fails once the queue is closed.
    pub fn push(&self, job: Job) -> Result<(), Job> {
        if self.closed.load(Ordering::Acquire) {
            return Err(job);
        }
        self.jobs.lock().push_back(job);
        self.notify.notify_one();
        Ok(())
    }

    /// Take the next job, waiting until one is available.
    /// Returns `None` once the queue is closed and drained.
    pub async fn next(&self) -> Option<Job> {
        loop {
            let notified = self.notify.notified();
            futures::pin_mut!(notified);
            // Register for a wakeup before checking the queue so a push
            // between the check and the await is not lost.
            notified.as_mut().enable();

            {
                let mut jobs = self.jobs.lock();
                if let Some(job) = jobs.pop_front() {
                    return Some(job);
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Close the queue: no new jobs are accepted, workers drain what is left.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }
}
