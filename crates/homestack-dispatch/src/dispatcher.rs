//! Event dispatcher - worker pool, awaited completions, recurring schedules
//!
//! Lifecycle commands decide *what* should happen and submit an event; a
//! bounded worker pool executes it through the configured runner and phones
//! the outcome back over a oneshot channel keyed by a correlation id. A
//! timeout on the awaiting side abandons the wait only; the worker keeps
//! running the operation to completion.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use homestack_core::{Error, Result};

use crate::event::Event;
use crate::queue::{Job, JobQueue};
use crate::runner::{JobOutcome, JobRunner};

/// Handle for a dispatched job
pub struct JobHandle {
    pub id: Uuid,
    rx: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    /// Wait for the worker to report completion.
    /// Returns `None` if the dispatcher shut down before the job finished.
    pub async fn wait(self) -> Option<JobOutcome> {
        self.rx.await.ok()
    }
}

/// Guard for a recurring submission; aborting it stops the schedule
pub struct ScheduledJob {
    handle: JoinHandle<()>,
}

impl ScheduledJob {
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for ScheduledJob {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Queue-backed event dispatcher
pub struct EventDispatcher {
    queue: Arc<JobQueue>,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl EventDispatcher {
    /// Create a dispatcher with `workers` concurrent executors
    pub fn new(runner: Arc<dyn JobRunner>, workers: usize) -> Self {
        let queue = Arc::new(JobQueue::new());
        let (shutdown_tx, _) = broadcast::channel(1);

        let mut handles = Vec::with_capacity(workers.max(1));
        for worker_id in 0..workers.max(1) {
            let queue = Arc::clone(&queue);
            let runner = Arc::clone(&runner);
            handles.push(tokio::spawn(async move {
                debug!("Worker {} started", worker_id);
                while let Some(job) = queue.next().await {
                    let label = job.event.label();
                    debug!("Worker {} executing {} ({})", worker_id, label, job.id);
                    let outcome = runner.run(&job.event).await;
                    if !outcome.success {
                        warn!("Job {} failed: {}", label, outcome.stdout.trim());
                    }
                    // The receiver may have timed out and gone away
                    let _ = job.done.send(outcome);
                }
                debug!("Worker {} stopped", worker_id);
            }));
        }

        Self {
            queue,
            workers: parking_lot::Mutex::new(handles),
            shutdown_tx,
        }
    }

    /// Submit an event without waiting for its outcome
    pub fn dispatch(&self, event: Event) -> Result<JobHandle> {
        enqueue(&self.queue, event)
    }

    /// Submit an event and wait for its outcome, up to `timeout`.
    ///
    /// The timeout abandons the wait, not the job: the underlying operation
    /// may still complete after the caller has already seen `Timeout`.
    pub async fn dispatch_and_await(&self, event: Event, timeout: Duration) -> Result<JobOutcome> {
        let label = event.label();
        let handle = self.dispatch(event)?;

        match tokio::time::timeout(timeout, handle.wait()).await {
            Ok(Some(outcome)) => Ok(outcome),
            Ok(None) => Err(Error::DispatcherClosed),
            Err(_) => {
                warn!("Timed out after {:?} waiting for {}", timeout, label);
                Err(Error::Timeout(label))
            }
        }
    }

    /// Resubmit an event on a fixed cadence until cancelled or shut down.
    /// The first submission happens immediately.
    pub fn schedule(&self, event: Event, every: Duration) -> ScheduledJob {
        let queue = Arc::clone(&self.queue);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!("Scheduling {} every {:?}", event.label(), every);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match enqueue(&queue, event.clone()) {
                            Ok(handle) => {
                                // Scheduled work is fire-and-forget; log failures only
                                let label = event.label();
                                tokio::spawn(async move {
                                    if let Some(outcome) = handle.wait().await {
                                        if !outcome.success {
                                            error!("Scheduled {} failed: {}", label, outcome.stdout.trim());
                                        }
                                    }
                                });
                            }
                            Err(_) => break,
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        ScheduledJob { handle }
    }

    /// How many jobs are queued but not yet leased by a worker
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Stop accepting work, let workers drain the queue, and stop schedules
    pub async fn shutdown(&self) {
        info!("Shutting down dispatcher");
        let _ = self.shutdown_tx.send(());
        self.queue.close();

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

fn enqueue(queue: &Arc<JobQueue>, event: Event) -> Result<JobHandle> {
    let id = Uuid::new_v4();
    let (tx, rx) = oneshot::channel();
    let job = Job {
        id,
        event,
        done: tx,
    };
    queue.push(job).map_err(|_| Error::DispatcherClosed)?;
    Ok(JobHandle { id, rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AppCommand;
    use crate::runner::MockRunner;

    fn dispatcher_with(runner: Arc<MockRunner>, workers: usize) -> Arc<EventDispatcher> {
        Arc::new(EventDispatcher::new(runner, workers))
    }

    #[tokio::test]
    async fn test_dispatch_and_await_success() {
        let runner = Arc::new(MockRunner::new());
        let dispatcher = dispatcher_with(Arc::clone(&runner), 2);

        let outcome = dispatcher
            .dispatch_and_await(
                Event::app(AppCommand::Start, "app-a"),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(runner.count("app:start:app-a"), 1);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_dispatch_and_await_failure_reports_output() {
        let runner = Arc::new(MockRunner::new());
        runner.fail_next("app:install:app-a", "no space left on device");
        let dispatcher = dispatcher_with(runner, 1);

        let outcome = dispatcher
            .dispatch_and_await(
                Event::app(AppCommand::Install, "app-a"),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.stdout, "no space left on device");
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_fails() {
        let runner = Arc::new(MockRunner::new());
        let dispatcher = dispatcher_with(runner, 1);
        dispatcher.shutdown().await;

        let result = dispatcher.dispatch(Event::system_info());
        assert!(matches!(result, Err(Error::DispatcherClosed)));
    }

    #[tokio::test]
    async fn test_await_timeout_leaves_job_running() {
        struct SlowRunner;

        #[async_trait::async_trait]
        impl JobRunner for SlowRunner {
            async fn run(&self, _event: &Event) -> JobOutcome {
                tokio::time::sleep(Duration::from_millis(200)).await;
                JobOutcome::success("late")
            }
        }

        let dispatcher = Arc::new(EventDispatcher::new(Arc::new(SlowRunner), 1));
        let result = dispatcher
            .dispatch_and_await(
                Event::app(AppCommand::Stop, "app-a"),
                Duration::from_millis(20),
            )
            .await;

        assert!(matches!(result, Err(Error::Timeout(_))));
        // The worker is still busy with the abandoned job
        tokio::time::sleep(Duration::from_millis(300)).await;
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_schedule_resubmits() {
        let runner = Arc::new(MockRunner::new());
        let dispatcher = dispatcher_with(Arc::clone(&runner), 1);

        let scheduled = dispatcher.schedule(Event::system_info(), Duration::from_millis(30));
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduled.cancel();

        // Immediate first submission plus at least two ticks
        assert!(runner.count("system:info") >= 3);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_dispatches_all_complete() {
        let runner = Arc::new(MockRunner::new());
        let dispatcher = dispatcher_with(Arc::clone(&runner), 4);

        let futures: Vec<_> = (0..8)
            .map(|i| {
                dispatcher.dispatch_and_await(
                    Event::app(AppCommand::Start, format!("app-{}", i)),
                    Duration::from_secs(5),
                )
            })
            .collect();

        for result in futures::future::join_all(futures).await {
            assert!(result.unwrap().success);
        }
        assert_eq!(runner.calls().len(), 8);
        dispatcher.shutdown().await;
    }
}
